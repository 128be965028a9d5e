use crate::config::{ExclusionSets, MirrorConfig};
use crate::error::{MirrorError, Result};
use crate::storage::Storage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 定位结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVolumes {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// 卷定位器：在根目录下查找带标记文件的源卷和目标卷
pub struct VolumeResolver<'a> {
    storage: &'a dyn Storage,
    exclusions: &'a ExclusionSets,
    source_marker: &'a str,
    destination_marker: &'a str,
}

impl<'a> VolumeResolver<'a> {
    pub fn new(storage: &'a dyn Storage, config: &'a MirrorConfig) -> Self {
        Self {
            storage,
            exclusions: &config.exclusions,
            source_marker: &config.source_marker,
            destination_marker: &config.destination_marker,
        }
    }

    pub async fn resolve(&self, root: &Path) -> Result<ResolvedVolumes> {
        let volumes = self
            .storage
            .list_dir(root)
            .await
            .map_err(|e| MirrorError::filesystem("list", root, e))?;

        let mut source: Option<PathBuf> = None;
        let mut destination: Option<PathBuf> = None;

        for volume in &volumes.subdirectories {
            if self.exclusions.is_volume_excluded(volume) {
                debug!("跳过卷: {}", volume);
                continue;
            }

            let path = root.join(volume);
            // 无法读取的卷（例如未授权）不可能是候选
            let files = match self.storage.list_dir(&path).await {
                Ok(listing) => listing.files,
                Err(e) => {
                    debug!("无法读取卷 {}: {}", path.display(), e);
                    continue;
                }
            };

            if source.is_none() && files.contains_key(self.source_marker) {
                info!("源卷: {}", path.display());
                source = Some(path.clone());
            }
            if destination.is_none() && files.contains_key(self.destination_marker) {
                info!("目标卷: {}", path.display());
                destination = Some(path);
            }
        }

        let source = source.ok_or_else(|| MirrorError::SourceNotFound {
            marker: self.source_marker.to_string(),
            root: root.to_path_buf(),
        })?;
        let destination = destination.ok_or_else(|| MirrorError::DestinationNotFound {
            marker: self.destination_marker.to_string(),
            root: root.to_path_buf(),
        })?;

        Ok(ResolvedVolumes {
            source,
            destination,
        })
    }
}
