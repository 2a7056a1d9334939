use async_trait::async_trait;

use crate::mt::error::MtResult;
use crate::mt::translator::MachineTranslator;

/// Identity backend: returns every text unchanged.
///
/// Useful to check a split/merge round trip without calling any service.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl MachineTranslator for PassthroughTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> MtResult<String> {
        Ok(text.to_string())
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source: &str,
        _target: &str,
    ) -> MtResult<Vec<String>> {
        Ok(texts.to_vec())
    }

    fn provider_name(&self) -> &str {
        "Passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_input() {
        let texts = vec!["一".to_string(), "".to_string(), "three".to_string()];
        let results = PassthroughTranslator
            .translate_batch(&texts, "zh-CN", "en")
            .await
            .unwrap();
        assert_eq!(results, texts);
        assert_eq!(PassthroughTranslator.translate("x", "a", "b").await.unwrap(), "x");
    }
}
