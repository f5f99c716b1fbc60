//! External S3 storage locations.

use tracing::info;

use crate::api::SynapseApi;
use crate::error::Result;
use crate::model::{ExternalS3StorageLocation, ProjectSetting};

#[derive(Debug, Clone, PartialEq)]
pub struct StorageBinding {
    pub storage_location_id: i64,
    pub setting: ProjectSetting,
}

/// Register `bucket`/`base_key` and make it the folder's only upload destination.
///
/// The bucket must already hold an `owner.txt` naming the caller, or the
/// platform refuses the registration.
pub fn bind_external_s3(
    api: &dyn SynapseApi,
    folder_id: &str,
    bucket: &str,
    base_key: &str,
    sts_enabled: bool,
) -> Result<StorageBinding> {
    let location = ExternalS3StorageLocation::new(bucket, base_key, sts_enabled);
    let storage_location_id = api.create_storage_location(&location)?;

    let setting = match api.get_upload_setting(folder_id)? {
        Some(mut existing) => {
            existing.locations = vec![storage_location_id];
            api.update_project_setting(&existing)?;
            existing
        }
        None => api.create_project_setting(&ProjectSetting::upload(
            folder_id,
            vec![storage_location_id],
        ))?,
    };
    info!(folder_id, bucket, base_key, storage_location_id, sts_enabled, "bound external storage location");
    Ok(StorageBinding {
        storage_location_id,
        setting,
    })
}
