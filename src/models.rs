use serde::{Serialize, Deserialize};
use serde_with::skip_serializing_none;
use chrono::Utc;
use uuid::Uuid;
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Image,
    Video,
    Text,
}

/// One generated artifact recorded in the session gallery.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneratedItem {
    pub id: String,
    pub kind: ItemKind,
    pub url: Option<String>, // data URI for images, blob reference for video
    pub content: Option<String>,
    pub timestamp: i64, // ms since epoch
    pub prompt: String,
}

impl GeneratedItem {
    pub fn image(url: String, prompt: &str) -> Self {
        Self::new(ItemKind::Image, Some(url), None, prompt)
    }

    pub fn video(url: String, prompt: &str) -> Self {
        Self::new(ItemKind::Video, Some(url), None, prompt)
    }

    fn new(kind: ItemKind, url: Option<String>, content: Option<String>, prompt: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            url,
            content,
            timestamp: Utc::now().timestamp_millis(),
            prompt: prompt.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")] Square,
    #[serde(rename = "3:4")] Portrait,
    #[serde(rename = "4:3")] Landscape,
    #[serde(rename = "9:16")] Tall,
    #[serde(rename = "16:9")] Wide,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [Self::Square, Self::Portrait, Self::Landscape, Self::Tall, Self::Wide];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "3:4",
            Self::Landscape => "4:3",
            Self::Tall => "9:16",
            Self::Wide => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

pub const STRUCTURE_TYPES: [&str; 4] = ["Reinforced Concrete", "Steel Structure", "Timber", "Masonry"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CostParameters {
    pub above_ground_area: f64, // sqm
    pub underground_area: f64,  // sqm
    pub floors: u32,
    pub structure_type: String,
    pub facade_material: String,
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            above_ground_area: 1000.0,
            underground_area: 0.0,
            floors: 2,
            structure_type: STRUCTURE_TYPES[0].to_string(),
            facade_material: "Glass Curtain Wall".to_string(),
        }
    }
}

impl CostParameters {
    /// Returns the first problem with the parameters, if any.
    pub fn validate(&self) -> Result<(), String> {
        if !self.above_ground_area.is_finite() || self.above_ground_area < 0.0 {
            return Err("above ground area must be a non-negative number".into());
        }
        if !self.underground_area.is_finite() || self.underground_area < 0.0 {
            return Err("underground area must be a non-negative number".into());
        }
        if self.floors < 1 {
            return Err("floor count must be at least 1".into());
        }
        Ok(())
    }

    pub fn build_prompt(&self) -> String {
        format!(
            "Perform a detailed architectural cost estimation for a building with the following specs:\n\
            - Above Ground Area: {} sqm\n\
            - Underground Area: {} sqm\n\
            - Floors: {}\n\
            - Structure: {}\n\
            - Facade: {}\n\
            \n\
            Please provide:\n\
            1. Estimated total construction cost (in CNY and USD).\n\
            2. Cost per square meter.\n\
            3. Breakdown of major costs (Civil works, MEP, Facade, Fit-out).\n\
            4. Structural complexity adjustment factor.\n\
            \n\
            Format the output as a clean Markdown report with tables.",
            self.above_ground_area,
            self.underground_area,
            self.floors,
            self.structure_type,
            self.facade_material,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    TextToImage,
    ImageCreativity,
    ImageEditing,
    Gallery,
    CostAnalysis,
    Animation,
    #[serde(rename = "image-to-3d")]
    ImageTo3d,
}

#[derive(Debug, Serialize, Clone)]
pub struct ToolConfig {
    pub id: ToolKind,
    pub title: &'static str,
    pub english_title: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

/// Dashboard entries, in display order.
pub fn tool_configs() -> Vec<ToolConfig> {
    vec![
        ToolConfig { id: ToolKind::TextToImage, title: "文字创意", english_title: "Text to Image", color: "bg-blue-500", description: "Input text to generate creative visuals." },
        ToolConfig { id: ToolKind::ImageCreativity, title: "图片创意", english_title: "Image Creativity", color: "bg-purple-500", description: "Single or double image generation." },
        ToolConfig { id: ToolKind::ImageEditing, title: "图片编辑", english_title: "Image Editing", color: "bg-green-500", description: "Brush modify and inpaint." },
        ToolConfig { id: ToolKind::Gallery, title: "生成库", english_title: "Gallery", color: "bg-teal-500", description: "View your generated assets." },
        ToolConfig { id: ToolKind::CostAnalysis, title: "造价分析", english_title: "Cost Analysis", color: "bg-red-500", description: "Estimate architectural costs." },
        ToolConfig { id: ToolKind::Animation, title: "文生动画", english_title: "Text to Animation", color: "bg-yellow-500", description: "Generate a short video from a prompt." },
        ToolConfig { id: ToolKind::ImageTo3d, title: "三维视图", english_title: "Image to 3D", color: "bg-orange-500", description: "Turn a plan or elevation into an isometric 3D view." },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn aspect_ratio_uses_literal_tokens() {
        let tokens: Vec<String> = AspectRatio::ALL.iter()
            .map(|r| serde_json::to_value(r).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(tokens, vec!["1:1", "3:4", "4:3", "9:16", "16:9"]);
        assert_eq!(AspectRatio::default().as_str(), "1:1");
        assert!(serde_json::from_str::<AspectRatio>("\"2:1\"").is_err());
    }

    #[test]
    fn cost_prompt_contains_every_parameter_verbatim() {
        let params = CostParameters {
            above_ground_area: 1000.0,
            underground_area: 0.0,
            floors: 2,
            structure_type: "Reinforced Concrete".into(),
            facade_material: "Glass Curtain Wall".into(),
        };
        let prompt = params.build_prompt();
        assert!(prompt.contains("Above Ground Area: 1000 sqm"));
        assert!(prompt.contains("Underground Area: 0 sqm"));
        assert!(prompt.contains("Floors: 2"));
        assert!(prompt.contains("Reinforced Concrete"));
        assert!(prompt.contains("Glass Curtain Wall"));
    }

    #[test]
    fn cost_parameters_reject_bad_values() {
        let mut params = CostParameters::default();
        assert!(params.validate().is_ok());
        params.floors = 0;
        assert!(params.validate().is_err());
        params.floors = 3;
        params.underground_area = -5.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn item_omits_absent_fields() {
        let item = GeneratedItem::image("data:image/png;base64,AAAA".into(), "a cube");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "image");
        assert!(json.get("content").is_none());
        assert_ne!(item.id, GeneratedItem::image(String::new(), "a cube").id);

        let report = GeneratedItem { kind: ItemKind::Text, url: None, content: Some("| a | b |".into()), ..item };
        let report = serde_json::to_value(report).unwrap();
        assert_eq!(report["kind"], "text");
        assert_eq!(report["content"], "| a | b |");
        assert!(report.get("url").is_none());
    }

    #[test]
    fn tool_ids_are_kebab_case() {
        assert_eq!(serde_json::to_value(ToolKind::ImageTo3d).unwrap(), "image-to-3d");
        assert_eq!(serde_json::to_value(ToolKind::CostAnalysis).unwrap(), "cost-analysis");
        assert_eq!(tool_configs().len(), 7);
    }
}
