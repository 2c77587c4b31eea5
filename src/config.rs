use crate::error::StampError;
use crate::geometry::{PlacementState, WorkspaceSize};
use crate::overlay::{OverlayRaster, UploadedImage};
use crate::pages::TargetSpec;
use crate::session::{Feature, Session};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything needed to stamp a document without a live workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampJob {
    pub feature: Feature,
    pub target: TargetSpec,
    /// 1-based page the viewer is on, used by the "current" target.
    pub page: usize,
    pub workspace: WorkspaceSize,
    pub placement: PlacementState,
}

impl Default for StampJob {
    fn default() -> Self {
        Self::for_feature(Feature::default())
    }
}

impl StampJob {
    pub fn for_feature(feature: Feature) -> Self {
        Self {
            feature,
            target: feature.default_target(),
            page: 1,
            workspace: WorkspaceSize::default(),
            placement: feature.default_placement(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("trabajo de estampado inválido")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("no se pudo leer el archivo de trabajo {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("en {}", path.display()))
    }

    /// Stamps `overlay` onto `document` as described by this job.
    pub fn run(&self, document: Vec<u8>, overlay: Vec<u8>) -> std::result::Result<Vec<u8>, StampError> {
        let mut session = Session::open(self.feature, document, self.workspace)?;
        session.set_current_page(self.page.saturating_sub(1));
        session.set_target(self.target.clone());
        session.set_overlay(OverlayRaster::Uploaded(UploadedImage {
            file_name: String::new(),
            bytes: overlay,
        }))?;
        session.editor_mut().set_placement(self.placement.clone());
        session.apply()
    }
}
