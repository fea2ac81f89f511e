// types.rs - Common data structures shared by the store, the pipeline and the snapshot
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default project name offered before the user configures anything
pub const DEFAULT_PROJECT_NAME: &str = "My Veo Movie";

/// Output frame shape. Only the two labels the video API accepts are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// Label passed through to the remote API
    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "16:9" | "landscape" | "youtube" => Some(AspectRatio::Landscape),
            "9:16" | "portrait" | "tiktok" => Some(AspectRatio::Portrait),
            _ => None,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a single scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Pending,
    Generating,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, GenerationStatus::Completed)
    }

    pub fn badge(&self) -> &'static str {
        match self {
            GenerationStatus::Idle => "ready",
            GenerationStatus::Pending => "queued",
            GenerationStatus::Generating => "generating",
            GenerationStatus::Completed => "done",
            GenerationStatus::Failed => "failed",
        }
    }
}

/// Scene label as written in the script: either a number or free text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SceneNumber {
    Number(i64),
    Label(String),
}

impl fmt::Display for SceneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneNumber::Number(n) => write!(f, "{}", n),
            SceneNumber::Label(s) => f.write_str(s),
        }
    }
}

impl From<i64> for SceneNumber {
    fn from(n: i64) -> Self {
        SceneNumber::Number(n)
    }
}

impl From<&str> for SceneNumber {
    fn from(s: &str) -> Self {
        SceneNumber::Label(s.to_string())
    }
}

/// One entry of a user supplied scene script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneInput {
    pub scene: SceneNumber,
    pub prompt: String,
}

/// Reference to a generated video that can be played locally (a file path)
pub type MediaRef = String;

/// A scene together with its generation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub scene: SceneNumber,
    pub prompt: String,
    pub status: GenerationStatus,
    /// Style prompt + scene prompt, fixed when the scene is created
    pub final_prompt: String,
    #[serde(rename = "videoUrl", default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Scene {
    /// Build an idle scene. The final prompt is computed here and never again.
    pub fn from_input(input: SceneInput, style_prompt: &str) -> Self {
        let final_prompt = format!("{}. Scene details: {}", style_prompt, input.prompt)
            .trim()
            .to_string();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            scene: input.scene,
            prompt: input.prompt,
            status: GenerationStatus::Idle,
            final_prompt,
            media_ref: None,
            error: None,
        }
    }

    /// Copy of this scene moved to `status`.
    ///
    /// A missing `media_ref` keeps the previous reference, and `error` is
    /// only kept when moving into `Failed`.
    pub fn with_status(
        &self,
        status: GenerationStatus,
        media_ref: Option<MediaRef>,
        error: Option<String>,
    ) -> Self {
        Self {
            status,
            media_ref: media_ref.or_else(|| self.media_ref.clone()),
            error: if status == GenerationStatus::Failed { error } else { None },
            ..self.clone()
        }
    }
}

/// Project level settings chosen in the configuration step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub api_key_present: bool,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub style_prompt: String,
    #[serde(default)]
    pub project_name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            api_key_present: false,
            aspect_ratio: AspectRatio::Landscape,
            style_prompt: String::new(),
            project_name: DEFAULT_PROJECT_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(prompt: &str) -> SceneInput {
        SceneInput {
            scene: SceneNumber::Number(1),
            prompt: prompt.to_string(),
        }
    }

    #[test]
    fn test_final_prompt_combines_style_once() {
        let scene = Scene::from_input(input("A neon city"), "Anime style");
        assert_eq!(scene.final_prompt, "Anime style. Scene details: A neon city");
        assert_eq!(scene.status, GenerationStatus::Idle);
    }

    #[test]
    fn test_final_prompt_trims_empty_style() {
        let scene = Scene::from_input(input("A neon city "), "");
        assert_eq!(scene.final_prompt, ". Scene details: A neon city");
    }

    #[test]
    fn test_with_status_keeps_media_and_clears_error() {
        let scene = Scene::from_input(input("x"), "style");
        let failed = scene.with_status(GenerationStatus::Failed, None, Some("boom".into()));
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let done = failed.with_status(GenerationStatus::Completed, Some("a.mp4".into()), None);
        assert_eq!(done.error, None);
        assert_eq!(done.media_ref.as_deref(), Some("a.mp4"));

        let reset = done.with_status(GenerationStatus::Idle, None, Some("ignored".into()));
        assert_eq!(reset.media_ref.as_deref(), Some("a.mp4"));
        assert_eq!(reset.error, None);
        assert_eq!(reset.id, scene.id);
    }

    #[test]
    fn test_scene_serializes_with_snapshot_keys() {
        let scene = Scene::from_input(input("x"), "s")
            .with_status(GenerationStatus::Completed, Some("v.mp4".into()), None);
        let json = serde_json::to_value(&scene).unwrap();
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["videoUrl"], "v.mp4");
        assert_eq!(json["scene"], 1);
        assert!(json.get("error").is_none());
        assert!(json.get("finalPrompt").is_some());
    }

    #[test]
    fn test_aspect_ratio_labels() {
        assert_eq!(serde_json::to_string(&AspectRatio::Portrait).unwrap(), "\"9:16\"");
        assert_eq!(AspectRatio::from_label("landscape"), Some(AspectRatio::Landscape));
        assert_eq!(AspectRatio::from_label("9:16"), Some(AspectRatio::Portrait));
        assert_eq!(AspectRatio::from_label("1:1"), None);
    }

    #[test]
    fn test_scene_number_accepts_text_labels() {
        let parsed: SceneInput =
            serde_json::from_str(r#"{"scene": "1a", "prompt": "p"}"#).unwrap();
        assert_eq!(parsed.scene, SceneNumber::Label("1a".into()));
    }
}
