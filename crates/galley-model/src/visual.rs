//! Visual artifacts

use serde::{Deserialize, Serialize};

/// Kind of generated visual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Plated dish
    Plating,
    /// Drink pairing
    Drink,
    /// Single ingredient
    Ingredient,
    /// Preparation schematic
    Schematic,
}

impl AssetKind {
    /// Label used in logs and prompts
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Plating => "plating",
            Self::Drink => "drink",
            Self::Ingredient => "ingredient",
            Self::Schematic => "schematic",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw image returned by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBytes {
    /// MIME type
    pub mime: String,
    /// Encoded image
    pub bytes: Vec<u8>,
}

impl ImageBytes {
    /// Create an image payload
    #[must_use]
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Whether the payload carries no data
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A generated image tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// What the image depicts
    pub kind: AssetKind,
    /// Image payload
    pub image: ImageBytes,
}

/// Textual stand-in for a visual that could not be generated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptiveBlueprint {
    /// Plating description
    pub plating: String,
    /// Dominant colors
    pub colors: String,
    /// Textures
    pub textures: String,
    /// Garnish
    pub garnish: String,
    /// Lighting
    pub lighting: String,
    /// Composition
    pub composition: String,
}

impl DescriptiveBlueprint {
    /// Whether every field is blank
    #[must_use]
    pub fn is_blank(&self) -> bool {
        [
            &self.plating,
            &self.colors,
            &self.textures,
            &self.garnish,
            &self.lighting,
            &self.composition,
        ]
        .iter()
        .all(|field| field.trim().is_empty())
    }
}

/// The authoritative visual for one requested asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualArtifact {
    /// Generated image
    Image(ImageAsset),
    /// Descriptive fallback
    Blueprint(DescriptiveBlueprint),
}

impl VisualArtifact {
    /// Whether this is the descriptive fallback
    #[inline]
    #[must_use]
    pub fn is_blueprint(&self) -> bool {
        matches!(self, Self::Blueprint(_))
    }

    /// The image, if one was generated
    #[inline]
    #[must_use]
    pub fn image(&self) -> Option<&ImageAsset> {
        match self {
            Self::Image(asset) => Some(asset),
            Self::Blueprint(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_blueprint() {
        assert!(DescriptiveBlueprint::default().is_blank());
        let filled = DescriptiveBlueprint {
            garnish: "chive".into(),
            ..DescriptiveBlueprint::default()
        };
        assert!(!filled.is_blank());
    }

    #[test]
    fn visual_accessors() {
        let image = VisualArtifact::Image(ImageAsset {
            kind: AssetKind::Plating,
            image: ImageBytes::new("image/png", vec![1, 2, 3]),
        });
        assert!(!image.is_blueprint());
        assert_eq!(image.image().map(|a| a.kind), Some(AssetKind::Plating));
        assert!(VisualArtifact::Blueprint(DescriptiveBlueprint::default()).is_blueprint());
    }
}
