//! Multimodal pet photo analysis

use crate::persistence::{JsonArchive, StoreError};
use crate::protocol::{Content, GenerateContentRequest, Part};
use crate::providers::{GenerativeModel, ProviderError};
use crate::structured::{parse_lenient, StructuredError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Archive prefix for analysis records
pub const PET_LOG_PREFIX: &str = "dog_life_log";

const ANALYZE_PROMPT: &str = "请根据这张照片，以 JSON 格式输出。";

/// Persona of the pet steward
pub const STEWARD_PROMPT: &str = r#"# 角色
你是一个精通犬类行为学的宠物管家，请通过图片精准识别狗狗情绪并给出专业建议。

# 背景
胖墩墩是一只非常可爱的狗狗，主人非常关心它的情绪和健康状况，希望你能帮助他们更好地照顾胖墩墩。

# 任务
通过用户给出的照片，分析胖墩墩的品种、情绪状态。

# 约束内容
1.如果照片中没有狗狗，请说明并提示用户重新拍摄。

# 输出格式
请严格以下以下 JSON 格式输出结果，输出中文，不要加其他开场白或解释。

# 示例
识别出：
{
    "dog_name": "胖墩墩",
    "breed_guess": "拉布拉多寻回犬",
    "helth_status": "良好",
    "happiness_level": 8,
    "mood_assessment": "开心且放松",
    "care_suggestions": "继续保持规律的运动和饮食，定期进行健康检查。"
}

未识别出：
{
    "error": "照片中未检测到狗狗，请重新拍摄一张包含狗狗的照片。"
}"#;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Failed to load image '{path}': {source}")]
    ImageLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a supported image ({mime})")]
    UnsupportedImage { path: String, mime: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Structured(#[from] StructuredError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the steward saw in a photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetObservation {
    #[serde(default)]
    pub dog_name: String,
    #[serde(default)]
    pub breed_guess: String,
    /// Wire key keeps the prompt's spelling
    #[serde(default, rename = "helth_status", alias = "health_status")]
    pub health_status: String,
    #[serde(default)]
    pub happiness_level: f64,
    #[serde(default)]
    pub mood_assessment: String,
    #[serde(default)]
    pub care_suggestions: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PetAnalysis {
    Observation(PetObservation),
    /// No dog in the photo; carries the steward's message
    NoDog(String),
}

impl PetAnalysis {
    /// Interpret a parsed reply
    pub fn from_value(value: Value) -> Result<Self, StructuredError> {
        if let Some(message) = value.get("error") {
            let message = match message {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(PetAnalysis::NoDog(message));
        }

        serde_json::from_value(value)
            .map(PetAnalysis::Observation)
            .map_err(|e| StructuredError::InvalidJson {
                message: e.to_string(),
                snippet: String::new(),
            })
    }
}

/// Photo analysis with an optional log
#[derive(Clone)]
pub struct PetLifeAssistant {
    name: String,
    system_instruction: String,
    model: Arc<dyn GenerativeModel>,
}

impl std::fmt::Debug for PetLifeAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetLifeAssistant")
            .field("name", &self.name)
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl PetLifeAssistant {
    /// Steward with the default persona
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self::with_persona("胖墩墩专属管家", STEWARD_PROMPT, model)
    }

    pub fn with_persona(
        name: impl Into<String>,
        system_instruction: impl Into<String>,
        model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self {
            name: name.into(),
            system_instruction: system_instruction.into(),
            model,
        }
    }

    /// Analyze a photo and return the raw parsed JSON along with its reading
    async fn analyze_value(&self, image_path: &Path) -> Result<(Value, PetAnalysis), VisionError> {
        let part = load_image(image_path).await?;
        info!(steward = %self.name, image = %image_path.display(), "Observing photo");

        let request = GenerateContentRequest::new(vec![Content::user_parts(vec![
            Part::text(ANALYZE_PROMPT),
            part,
        ])])
        .with_system_instruction(self.system_instruction.clone());

        let response = self.model.generate(&request).await?;
        let text = response.text().ok_or(StructuredError::Empty)?;
        let value: Value = parse_lenient(&text)?;
        let analysis = PetAnalysis::from_value(value.clone())?;
        Ok((value, analysis))
    }

    /// Analyze a photo
    pub async fn analyze(&self, image_path: impl AsRef<Path>) -> Result<PetAnalysis, VisionError> {
        let (_, analysis) = self.analyze_value(image_path.as_ref()).await?;
        Ok(analysis)
    }

    /// Analyze a photo and archive the reply as a `dog_life_log` record
    pub async fn analyze_and_log(
        &self,
        image_path: impl AsRef<Path>,
        archive: &JsonArchive,
    ) -> Result<(PetAnalysis, PathBuf), VisionError> {
        let (value, analysis) = self.analyze_value(image_path.as_ref()).await?;
        let path = archive.save(PET_LOG_PREFIX, &value)?;
        Ok((analysis, path))
    }
}

/// Read an image and wrap it as an inline-data part
pub async fn load_image(path: &Path) -> Result<Part, VisionError> {
    let mime = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    if !mime.starts_with("image/") {
        return Err(VisionError::UnsupportedImage {
            path: path.display().to_string(),
            mime,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| VisionError::ImageLoad {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Part::inline_image(mime, STANDARD.encode(bytes)))
}

/// Happiness of one dog across archived observations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HappinessSummary {
    pub average: f64,
    /// Records that counted towards the average
    pub observations: usize,
}

/// Mean happiness of `dog_name` across archived observations
pub fn happiness_average(records: &[Value], dog_name: &str) -> Option<HappinessSummary> {
    let levels: Vec<f64> = records
        .iter()
        .filter(|r| r.get("dog_name").and_then(Value::as_str) == Some(dog_name))
        .filter_map(|r| r.get("happiness_level").and_then(Value::as_f64))
        .collect();

    if levels.is_empty() {
        return None;
    }
    Some(HappinessSummary {
        average: levels.iter().sum::<f64>() / levels.len() as f64,
        observations: levels.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_dog_reply() {
        let analysis = PetAnalysis::from_value(json!({"error": "照片中未检测到狗狗"})).unwrap();
        assert_eq!(analysis, PetAnalysis::NoDog("照片中未检测到狗狗".to_string()));
    }

    #[test]
    fn test_observation_keeps_wire_spelling() {
        let analysis = PetAnalysis::from_value(json!({
            "dog_name": "胖墩墩",
            "breed_guess": "柯基",
            "helth_status": "良好",
            "happiness_level": 8,
            "mood_assessment": "开心",
            "care_suggestions": "多散步"
        }))
        .unwrap();

        match analysis {
            PetAnalysis::Observation(obs) => {
                assert_eq!(obs.health_status, "良好");
                assert_eq!(obs.happiness_level, 8.0);
                let back = serde_json::to_value(&obs).unwrap();
                assert_eq!(back["helth_status"], "良好");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_happiness_average_filters_by_name() {
        let records = vec![
            json!({"dog_name": "胖墩墩", "happiness_level": 8}),
            json!({"dog_name": "胖墩墩", "happiness_level": 6}),
            json!({"dog_name": "旺财", "happiness_level": 2}),
            json!({"error": "没有狗"}),
        ];
        assert_eq!(
            happiness_average(&records, "胖墩墩"),
            Some(HappinessSummary {
                average: 7.0,
                observations: 2
            })
        );
        assert_eq!(happiness_average(&records, "小黑"), None);
    }

    #[tokio::test]
    async fn test_load_image_rejects_non_images() {
        let err = load_image(Path::new("notes.txt")).await.unwrap_err();
        assert!(matches!(err, VisionError::UnsupportedImage { .. }));

        let err = load_image(Path::new("/definitely/missing.jpeg")).await.unwrap_err();
        assert!(matches!(err, VisionError::ImageLoad { .. }));
    }
}
