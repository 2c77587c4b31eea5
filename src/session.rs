use crate::error::{Result, StampError};
use crate::geometry::{to_page_space, PlacementState, WorkspaceSize};
use crate::interaction::OverlayEditor;
use crate::overlay::{OverlayRaster, OverlaySource};
use crate::pages::{resolve_targets, TargetSpec};
use crate::{pdf, stamp};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    #[default]
    Sign,
    Watermark,
}

impl Feature {
    pub fn default_target(self) -> TargetSpec {
        match self {
            Feature::Sign => TargetSpec::Current,
            Feature::Watermark => TargetSpec::All,
        }
    }

    pub fn default_placement(self) -> PlacementState {
        PlacementState {
            opacity: self.default_opacity(),
            ..Default::default()
        }
    }

    pub fn default_opacity(self) -> f64 {
        match self {
            Feature::Sign => 1.0,
            Feature::Watermark => 0.5,
        }
    }

    /// Largest share of the workspace a freshly loaded overlay may cover.
    fn fit_fraction(self) -> f64 {
        match self {
            Feature::Sign => 0.3,
            Feature::Watermark => 0.6,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    feature: Feature,
    document: Vec<u8>,
    page_count: usize,
    current_page: usize,
    target: TargetSpec,
    overlay: Option<OverlayRaster>,
    editor: OverlayEditor,
}

impl Session {
    pub fn open(feature: Feature, document: Vec<u8>, workspace: WorkspaceSize) -> Result<Self> {
        let page_count = pdf::page_count(&document)?;
        info!(?feature, page_count, "session opened");
        Ok(Self {
            feature,
            document,
            page_count,
            current_page: 0,
            target: feature.default_target(),
            overlay: None,
            editor: OverlayEditor::new(feature.default_placement(), workspace),
        })
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    pub fn document(&self) -> &[u8] {
        &self.document
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Zero-based; clamped to the last page.
    pub fn set_current_page(&mut self, index: usize) {
        self.current_page = index.min(self.page_count.saturating_sub(1));
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    pub fn set_target(&mut self, target: TargetSpec) {
        self.target = target;
    }

    pub fn overlay(&self) -> Option<&OverlayRaster> {
        self.overlay.as_ref()
    }

    /// Replaces the overlay and resizes the placement to its aspect ratio.
    /// An unreadable image is rejected and the previous overlay kept.
    pub fn set_overlay(&mut self, raster: OverlayRaster) -> Result<()> {
        if let Some(bytes) = raster.raster()? {
            let source = OverlaySource::from_bytes(&bytes)?;
            let fitted = PlacementState::fitted(source.size(), self.editor.workspace(), self.feature.fit_fraction());
            self.editor.set_size(fitted.size_pixels);
        }
        self.overlay = Some(raster);
        Ok(())
    }

    pub fn editor(&self) -> &OverlayEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut OverlayEditor {
        &mut self.editor
    }

    pub fn enter(&mut self) {
        self.editor = OverlayEditor::new(self.feature.default_placement(), self.editor.workspace());
        self.target = self.feature.default_target();
    }

    /// Ends any gesture, then stamps. On error the session is left as it was.
    pub fn apply(&mut self) -> Result<Vec<u8>> {
        self.editor.pointer_up();

        let overlay = self
            .overlay
            .as_ref()
            .ok_or(StampError::MissingOverlay)?
            .source()?;
        let pages = resolve_targets(&self.target, self.current_page, self.page_count)?;
        let placement = self.editor.placement().clone();
        placement.validate()?;
        let workspace = self.editor.workspace();

        info!(feature = ?self.feature, pages = pages.len(), "applying overlay");
        stamp::stamp(&self.document, &overlay, &pages, |page| {
            to_page_space(&placement, workspace, page)
        })
    }
}
