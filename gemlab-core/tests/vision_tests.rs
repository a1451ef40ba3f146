//! Integration tests for photo analysis and the pet life log

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gemlab_core::persistence::JsonArchive;
use gemlab_core::providers::ScriptedModel;
use gemlab_core::vision::{PetAnalysis, PetLifeAssistant, PET_LOG_PREFIX, STEWARD_PROMPT};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9];

const OBSERVATION_REPLY: &str = r#"```json
{
    "dog_name": "胖墩墩",
    "breed_guess": "柯基",
    "helth_status": "良好",
    "happiness_level": 9,
    "mood_assessment": "开心且放松",
    "care_suggestions": "多带它去草地上跑跑。"
}
```"#;

#[tokio::test]
async fn test_analyze_sends_photo_inline() {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("pangdundun.jpg");
    fs::write(&photo, JPEG_BYTES).unwrap();

    let model = Arc::new(ScriptedModel::from_texts([OBSERVATION_REPLY]));
    let assistant = PetLifeAssistant::new(model.clone());

    match assistant.analyze(&photo).await.unwrap() {
        PetAnalysis::Observation(obs) => {
            assert_eq!(obs.dog_name, "胖墩墩");
            assert_eq!(obs.breed_guess, "柯基");
            assert_eq!(obs.health_status, "良好");
            assert_eq!(obs.happiness_level, 9.0);
        }
        other => panic!("unexpected {other:?}"),
    }

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let system = request.system_instruction.as_ref().unwrap();
    assert_eq!(system.text().unwrap(), STEWARD_PROMPT);

    let parts = &request.contents[0].parts;
    assert!(parts.iter().any(|p| p.text.as_deref().is_some_and(|t| !t.is_empty())));
    let image = parts
        .iter()
        .find_map(|p| p.inline_data.as_ref())
        .expect("image part");
    assert_eq!(image.mime_type, "image/jpeg");
    assert_eq!(image.data, STANDARD.encode(JPEG_BYTES));
}

#[tokio::test]
async fn test_photo_without_dog() {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("sofa.jpg");
    fs::write(&photo, JPEG_BYTES).unwrap();

    let model = Arc::new(ScriptedModel::from_texts([
        r#"{"error": "照片中未检测到狗狗，请重新拍摄一张包含狗狗的照片。"}"#,
    ]));
    let analysis = PetLifeAssistant::new(model).analyze(&photo).await.unwrap();

    assert_eq!(
        analysis,
        PetAnalysis::NoDog("照片中未检测到狗狗，请重新拍摄一张包含狗狗的照片。".to_string())
    );
}

#[tokio::test]
async fn test_analyze_and_log_archives_reply() {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("park.jpeg");
    fs::write(&photo, JPEG_BYTES).unwrap();
    let archive = JsonArchive::new(dir.path().join("logs"));

    let model = Arc::new(ScriptedModel::from_texts([OBSERVATION_REPLY]));
    let (analysis, path) = PetLifeAssistant::new(model)
        .analyze_and_log(&photo, &archive)
        .await
        .unwrap();
    assert!(matches!(analysis, PetAnalysis::Observation(_)));

    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with(&format!("{}_", PET_LOG_PREFIX)));
    assert!(file_name.ends_with(".json"));

    let records = archive.load_all(PET_LOG_PREFIX).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].1, path);
    assert_eq!(records[0].0["dog_name"], "胖墩墩");
    assert_eq!(records[0].0["helth_status"], "良好");
}
