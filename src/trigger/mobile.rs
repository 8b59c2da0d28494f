//! Mobile application overrides
//!
//! A local application file is uploaded once per (file path, application)
//! within a run, however many tests use it. Uploads run concurrently.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use synthetics_protocol::{
    MobileApplication, MobileReferenceType, Test, TestPayload, TestType, UserConfigOverride,
};
use tracing::{debug, info};

use crate::api::{EndpointError, MobileAppUploader};
use crate::errors::{CiErrorCode, RunError};

/// An application file to upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UploadKey {
    pub file_path: String,
    pub application_id: String,
}

/// Applications uploaded during a run, by local file path
#[derive(Debug, Clone, Default)]
pub struct UploadedApplications {
    by_path: BTreeMap<String, Vec<(String, String)>>,
}

impl UploadedApplications {
    /// Stored file name of an upload
    pub fn file_name(&self, file_path: &str, application_id: &str) -> Option<&str> {
        self.by_path
            .get(file_path)?
            .iter()
            .find(|(id, _)| id == application_id)
            .map(|(_, file_name)| file_name.as_str())
    }

    fn insert(&mut self, key: UploadKey, file_name: String) {
        self.by_path
            .entry(key.file_path)
            .or_default()
            .push((key.application_id, file_name));
    }

    pub fn len(&self) -> usize {
        self.by_path.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// A mobile test with the override it was requested with
pub struct MobileTarget<'a> {
    pub test: &'a Test,
    pub config: &'a UserConfigOverride,
    pub payload: &'a mut TestPayload,
}

fn application_id(test: &Test) -> Result<String, RunError> {
    test.options
        .mobile_application
        .as_ref()
        .map(|app| app.application_id.clone())
        .ok_or_else(|| {
            RunError::critical(
                CiErrorCode::UploadMobileApplicationTestsFailed,
                format!("[{}] Test has no mobile application", test.public_id),
            )
        })
}

fn upload_key(test: &Test, config: &UserConfigOverride) -> Result<Option<UploadKey>, RunError> {
    if test.test_type != TestType::Mobile {
        return Ok(None);
    }
    let Some(file_path) = &config.mobile_application_version_file_path else {
        return Ok(None);
    };

    Ok(Some(UploadKey {
        file_path: file_path.clone(),
        application_id: application_id(test)?,
    }))
}

async fn upload(
    uploader: &dyn MobileAppUploader,
    key: UploadKey,
) -> (UploadKey, Result<String, EndpointError>) {
    debug!(
        file_path = %key.file_path,
        application_id = %key.application_id,
        "uploading application"
    );
    let result = uploader
        .upload_application(&key.application_id, &key.file_path)
        .await
        .map_err(|e| EndpointError::new("upload application", &e).with_subject(&key.file_path));
    (key, result)
}

/// Upload the applications `targets` need and point their payloads at them.
///
/// Every upload is attempted before the first failure is reported.
pub async fn override_mobile_applications(
    uploader: Option<&dyn MobileAppUploader>,
    targets: &mut [MobileTarget<'_>],
) -> Result<UploadedApplications, RunError> {
    let mut keys = BTreeSet::new();
    for target in targets.iter() {
        if let Some(key) = upload_key(target.test, target.config)? {
            keys.insert(key);
        }
    }

    let mut uploaded = UploadedApplications::default();
    if !keys.is_empty() {
        let uploader = uploader.ok_or_else(|| {
            RunError::critical(
                CiErrorCode::UploadMobileApplicationTestsFailed,
                "No application uploader is configured",
            )
        })?;

        let results = join_all(keys.into_iter().map(|key| upload(uploader, key))).await;
        for (key, result) in results {
            let file_name = result.map_err(|e| {
                RunError::critical(CiErrorCode::UploadMobileApplicationTestsFailed, e.message)
            })?;
            info!(file_path = %key.file_path, %file_name, "uploaded application");
            uploaded.insert(key, file_name);
        }
    }

    for target in targets.iter_mut() {
        if target.test.test_type != TestType::Mobile {
            continue;
        }

        if let Some(key) = upload_key(target.test, target.config)? {
            if let Some(file_name) = uploaded.file_name(&key.file_path, &key.application_id) {
                target.payload.mobile_application = Some(MobileApplication {
                    application_id: key.application_id.clone(),
                    reference_id: file_name.to_string(),
                    reference_type: MobileReferenceType::Temporary,
                });
            }
        } else if let Some(version) = &target.config.mobile_application_version {
            target.payload.mobile_application = Some(MobileApplication {
                application_id: application_id(target.test)?,
                reference_id: version.clone(),
                reference_type: MobileReferenceType::Version,
            });
        }
    }

    Ok(uploaded)
}
