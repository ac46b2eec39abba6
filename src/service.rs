//! The concrete service.

use crate::contract::SampleContract;
use crate::model::CustomModel;
use crate::xml::XmlElement;
use async_trait::async_trait;
use tracing::info;

/// Stateless implementation of [`SampleContract`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleService;

#[async_trait]
impl SampleContract for SampleService {
    async fn test(&self, s: String) -> String {
        info!("Test Method Executed!");
        s
    }

    async fn xml_method(&self, xml: XmlElement) {
        info!("{}", xml);
    }

    async fn echo_model(&self, input_model: CustomModel) -> CustomModel {
        input_model
    }
}
