//! Built-in Live2D figures.
//!
//! Both figures dock to the right edge, stay visible on mobile layouts and
//! share the same scale and offset; they differ only in the model asset.

use leafmate_registry::{AvatarLoader, DockedPosition, Live2dModel};
use leafmate_types::LeafError;
use tracing::debug;

/// Registry name of the cat-boy figure (the default).
pub const CAT_BOY: &str = "小叶子";
/// Registry name of the fox-boy figure.
pub const FOX_BOY: &str = "狐狸";

/// An [`AvatarLoader`] for one fixed `.model3.json` asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Live2dAvatar {
    model_path: String,
    scale: f32,
    position: (f32, f32),
    docked: DockedPosition,
    mobile_display: bool,
}

impl Live2dAvatar {
    /// A right-docked figure at the standard scale and offset.
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            scale: 0.08,
            position: (0.0, 70.0),
            docked: DockedPosition::Right,
            mobile_display: true,
        }
    }

    pub fn cat_boy() -> Self {
        Self::new("/live2d/cat-boy/白猫正太.model3.json")
    }

    pub fn fox_boy() -> Self {
        Self::new("/live2d/fox-boy/hlxz.model3.json")
    }
}

impl AvatarLoader for Live2dAvatar {
    fn load(&self, mount: &str) -> Result<Live2dModel, LeafError> {
        if mount.trim().is_empty() {
            return Err(LeafError::Avatar("no element to mount the figure into".into()));
        }
        debug!(mount, model = %self.model_path, "avatar loaded");
        Ok(Live2dModel {
            mount: mount.to_string(),
            model_path: self.model_path.clone(),
            scale: self.scale,
            position: self.position,
            docked: self.docked,
            mobile_display: self.mobile_display,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cat_boy_descriptor() {
        let model = Live2dAvatar::cat_boy().load("live2d").unwrap();
        assert_eq!(model.mount, "live2d");
        assert_eq!(model.model_path, "/live2d/cat-boy/白猫正太.model3.json");
        assert_eq!(model.scale, 0.08);
        assert_eq!(model.position, (0.0, 70.0));
        assert_eq!(model.docked, DockedPosition::Right);
        assert!(model.mobile_display);
    }

    #[test]
    fn fox_boy_differs_only_in_asset() {
        let cat = Live2dAvatar::cat_boy().load("m").unwrap();
        let fox = Live2dAvatar::fox_boy().load("m").unwrap();
        assert_eq!(fox.model_path, "/live2d/fox-boy/hlxz.model3.json");
        assert_eq!(Live2dModel { model_path: cat.model_path.clone(), ..fox }, cat);
    }

    #[test]
    fn blank_mount_is_rejected() {
        let err = Live2dAvatar::cat_boy().load("  ").unwrap_err();
        assert!(matches!(err, LeafError::Avatar(_)));
    }
}
