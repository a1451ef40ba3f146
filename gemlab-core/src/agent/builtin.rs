//! Built-in tools backed by fixed lookup tables or the vector store

use super::tool::{parse_args, Tool, ToolError, ToolRegistry};
use crate::rag::VectorStore;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Grams of food per kilogram of body weight
const FOOD_GRAMS_PER_KG: f64 = 30.0;
/// Extra share for active dogs
const ACTIVE_FACTOR: f64 = 1.2;
/// Documents returned by [`SearchKnowledgeBase`]
const KNOWLEDGE_HITS: usize = 3;

fn default_city() -> String {
    "上海".to_string()
}

fn default_weight() -> f64 {
    7.5
}

fn default_active() -> bool {
    true
}

fn default_role() -> String {
    "小狗".to_string()
}

#[derive(Debug, Deserialize)]
struct CityArgs {
    #[serde(default = "default_city")]
    city: String,
}

/// Current weather from a fixed table
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentWeather;

impl CurrentWeather {
    pub fn lookup(city: &str) -> &'static str {
        match city {
            "上海" => "晴天, 25°C, 微风",
            "北京" => "多云, 18°C, 有雾霾",
            "常州" => "小雨, 22°C, 适合睡觉",
            _ => "未知天气, 建议看天气预报",
        }
    }
}

#[async_trait]
impl Tool for CurrentWeather {
    fn name(&self) -> &str {
        "get_current_weather"
    }

    fn description(&self) -> &str {
        "查询指定城市的实时天气。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "city": {"type": "STRING", "description": "城市名称，例如 \"上海\", \"北京\""}
            }
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let args: CityArgs = parse_args(self.name(), args)?;
        info!(city = %args.city, "Looking up weather");
        Ok(json!(Self::lookup(&args.city)))
    }
}

#[derive(Debug, Deserialize)]
struct DogFoodArgs {
    #[serde(default = "default_weight")]
    weight_kg: f64,
    #[serde(default = "default_active")]
    is_active: bool,
}

/// Daily dog food in grams
#[derive(Debug, Clone, Copy, Default)]
pub struct DogFoodCalculator;

impl DogFoodCalculator {
    /// `weight_kg * 30`, plus 20% when active, truncated to whole grams
    pub fn grams(weight_kg: f64, is_active: bool) -> i64 {
        let mut amount = weight_kg * FOOD_GRAMS_PER_KG;
        if is_active {
            amount *= ACTIVE_FACTOR;
        }
        amount as i64
    }
}

#[async_trait]
impl Tool for DogFoodCalculator {
    fn name(&self) -> &str {
        "calculate_dog_food"
    }

    fn description(&self) -> &str {
        "根据体重计算狗狗每天需要的狗粮克数。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "weight_kg": {"type": "NUMBER", "description": "狗狗体重(kg)"},
                "is_active": {"type": "BOOLEAN", "description": "是否活泼好动"}
            }
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let args: DogFoodArgs = parse_args(self.name(), args)?;
        if !args.weight_kg.is_finite() || args.weight_kg < 0.0 {
            return Err(ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: format!("weight_kg must be a non-negative number, got {}", args.weight_kg),
            });
        }
        info!(weight_kg = args.weight_kg, is_active = args.is_active, "Calculating dog food");
        Ok(json!(Self::grams(args.weight_kg, args.is_active)))
    }
}

/// Weather from the second lookup table used by the function-calling demos
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherInfo;

#[async_trait]
impl Tool for WeatherInfo {
    fn name(&self) -> &str {
        "get_weather_info"
    }

    fn description(&self) -> &str {
        "获取指定城市的天气信息。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "city": {"type": "STRING", "description": "城市名称"}
            }
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let args: CityArgs = parse_args(self.name(), args)?;
        let weather = match args.city.as_str() {
            "上海" => "18度，晴转多云",
            "北京" => "20度，晴",
            "广州" => "16度，阴转小雨",
            _ => "未找到当地天气，请联系气象部门",
        };
        Ok(json!(weather))
    }
}

#[derive(Debug, Deserialize)]
struct RoleArgs {
    #[serde(default = "default_role")]
    role: String,
}

/// Family member names by role
#[derive(Debug, Clone, Copy, Default)]
pub struct NameInfo;

#[async_trait]
impl Tool for NameInfo {
    fn name(&self) -> &str {
        "get_name_info"
    }

    fn description(&self) -> &str {
        "根据角色（妈妈、小狗、我）查询对应的名字。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "role": {"type": "STRING", "description": "角色，例如 \"妈妈\", \"小狗\", \"我\""}
            }
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let args: RoleArgs = parse_args(self.name(), args)?;
        let name = match args.role.as_str() {
            "妈妈" => "霍妮媛",
            "小狗" => "胖墩墩",
            "我" => "赵一清",
            _ => "未找到对应信息",
        };
        Ok(json!(name))
    }
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

/// Private-memory lookup over the vector store
#[derive(Debug, Clone)]
pub struct SearchKnowledgeBase {
    store: Arc<VectorStore>,
}

impl SearchKnowledgeBase {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchKnowledgeBase {
    fn name(&self) -> &str {
        "search_knowledge_base"
    }

    fn description(&self) -> &str {
        "查询私有知识库，包括胖墩墩的生活日记和赵一清的技术笔记。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "query": {"type": "STRING", "description": "要检索的问题或关键词"}
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let args: QueryArgs = parse_args(self.name(), args)?;
        info!(query = %args.query, "Searching knowledge base");

        let hits = self.store.query(&args.query, KNOWLEDGE_HITS, None).await?;
        if hits.is_empty() {
            return Ok(json!("知识库中没有找到相关信息。"));
        }
        let joined = hits
            .iter()
            .map(|h| h.document.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Value::String(joined))
    }
}

/// Weather and dog food tools
pub fn pet_care_tools() -> ToolRegistry {
    ToolRegistry::new()
        .with(CurrentWeather)
        .with(DogFoodCalculator)
}

/// Pet care tools plus knowledge base search
pub fn steward_tools(store: Arc<VectorStore>) -> ToolRegistry {
    ToolRegistry::new()
        .with(SearchKnowledgeBase::new(store))
        .with(CurrentWeather)
        .with(DogFoodCalculator)
}

/// The weather and name lookups of the manual function-calling flow
pub fn family_tools() -> ToolRegistry {
    ToolRegistry::new().with(WeatherInfo).with(NameInfo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedEmbedder;
    use crate::rag::Metadata;
    use test_case::test_case;

    #[test_case(7.5, true, 270; "default active")]
    #[test_case(8.5, true, 306; "heavier active")]
    #[test_case(10.0, false, 300; "inactive")]
    #[test_case(0.1, false, 3; "truncated")]
    fn test_dog_food_grams(weight: f64, active: bool, expected: i64) {
        assert_eq!(DogFoodCalculator::grams(weight, active), expected);
    }

    #[tokio::test]
    async fn test_defaults_apply_when_args_missing() {
        assert_eq!(CurrentWeather.call(Value::Null).await.unwrap(), json!("晴天, 25°C, 微风"));
        assert_eq!(DogFoodCalculator.call(json!({})).await.unwrap(), json!(270));
        assert_eq!(NameInfo.call(json!({})).await.unwrap(), json!("胖墩墩"));
        assert_eq!(
            WeatherInfo.call(json!({"city": "深圳"})).await.unwrap(),
            json!("未找到当地天气，请联系气象部门")
        );
    }

    #[tokio::test]
    async fn test_dog_food_rejects_negative_weight() {
        let err = DogFoodCalculator
            .call(json!({"weight_kg": -2.0}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_search_knowledge_base_joins_top_documents() {
        let embedder = ScriptedEmbedder::new().with_fallback(vec![1.0, 0.0]);
        let mut store = VectorStore::new("categorized_memory", Arc::new(embedder));
        let docs: Vec<String> = (0..5).map(|i| format!("日记 {}", i)).collect();
        let ids = (0..5).map(|i| format!("diary_x_{}", i)).collect();
        store
            .upsert(ids, docs, vec![Metadata::new(); 5])
            .await
            .unwrap();

        let tool = SearchKnowledgeBase::new(Arc::new(store));
        let result = tool.call(json!({"query": "胖墩墩"})).await.unwrap();
        assert_eq!(result.as_str().unwrap().lines().count(), KNOWLEDGE_HITS);

        let err = tool.call(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_registries() {
        let store = Arc::new(VectorStore::new(
            "c",
            Arc::new(ScriptedEmbedder::new()),
        ));
        assert_eq!(
            steward_tools(store).names(),
            vec!["search_knowledge_base", "get_current_weather", "calculate_dog_food"]
        );
        assert_eq!(family_tools().names(), vec!["get_weather_info", "get_name_info"]);
        assert_eq!(pet_care_tools().len(), 2);
    }
}
