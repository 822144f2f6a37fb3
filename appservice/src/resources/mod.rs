//! Resource handlers
//!
//! Every handler keeps a copy of [`AppServiceProviderData`] from `configure`
//! and turns each failure into a diagnostic that names the operation and the
//! Azure resource ID.

mod active_slot;
mod function_app;
mod site;
mod static_web_app;
mod web_app;

pub use active_slot::ActiveSlotResource;
pub use function_app::{FunctionAppModel, LinuxFunctionApp, WindowsFunctionApp};
pub use site::{SiteCommon, SiteFlavor, SiteResource, SiteTarget};
pub(crate) use static_web_app::read_static_web_app;
pub use static_web_app::StaticWebAppResource;
pub use web_app::{LinuxWebApp, WebAppModel, WindowsWebApp};

use crate::api::lro::race;
use crate::provider_data::AppServiceProviderData;
use serde::Serialize;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::schema::Schema;
use tfplug::timeouts::Timeouts;
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

/// Default deadlines when Terraform did not set one
pub(crate) const TIMEOUTS: Timeouts = Timeouts::minutes(30, 5, 30, 30);

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

/// Shared by every `configure` implementation in this crate
pub(crate) fn extract_provider_data(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> Result<AppServiceProviderData, Diagnostic> {
    let Some(data) = provider_data else {
        return Err(Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        ));
    };

    data.downcast_ref::<AppServiceProviderData>()
        .cloned()
        .ok_or_else(|| {
            Diagnostic::error(
                "Invalid provider data",
                "Failed to extract AppServiceProviderData from provider data",
            )
        })
}

/// `"Failed reading Linux Web App"` / `"reading Linux Web App {id}: {err}"`
pub(crate) fn operation_error(
    action: &str,
    what: &str,
    id: &impl Display,
    err: &impl Display,
) -> Diagnostic {
    Diagnostic::error(
        format!("Failed {} {}", action, what),
        format!("{} {} {}: {}", action, what, id, err),
    )
}

/// Run one handler step, failing it with an `operation_error` once `ctx`
/// is done
pub(crate) async fn within<T>(
    ctx: &Context,
    action: &str,
    what: &str,
    id: &impl Display,
    step: impl Future<Output = Result<T, Diagnostic>>,
) -> Result<T, Diagnostic> {
    match race(ctx, step).await {
        Ok(result) => result,
        Err(e) => Err(operation_error(action, what, id, &e)),
    }
}

pub(crate) fn requires_import(type_name: &str, id: &impl Display) -> Diagnostic {
    Diagnostic::error(
        "Resource already exists",
        format!(
            "A resource with the ID {:?} already exists - to be managed via Terraform this resource needs to be imported into the State. Please see the resource documentation for {:?} for more information.",
            id.to_string(),
            type_name
        ),
    )
}

/// Encode `model` as state, keeping only the members `schema` declares.
/// One model type can then back resources whose schemas differ slightly.
pub(crate) fn state_from_model<T: Serialize>(
    model: &T,
    schema: &Schema,
) -> tfplug::Result<DynamicValue> {
    let mut state = DynamicValue::from_model(model)?;
    if let Dynamic::Map(members) = &mut state.value {
        members.retain(|name, _| {
            schema.block.attribute(name).is_some() || schema.block.nested_block(name).is_some()
        });
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
    use tfplug::types::AttributePath;

    #[derive(Serialize)]
    struct Model {
        name: String,
        hidden: bool,
        rule: Vec<String>,
    }

    #[test]
    fn state_keeps_declared_members_only() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .block(NestedBlockBuilder::list("rule").build())
            .build();

        let state = state_from_model(
            &Model {
                name: "web".to_string(),
                hidden: true,
                rule: vec![],
            },
            &schema,
        )
        .unwrap();

        assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "web");
        assert!(state.get(&AttributePath::new("rule")).is_some());
        assert!(state.get(&AttributePath::new("hidden")).is_none());
    }

    #[tokio::test]
    async fn within_stops_a_step_at_the_deadline() {
        let ctx = Context::new().with_timeout(std::time::Duration::from_millis(20));
        let step = async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok::<_, Diagnostic>(())
        };

        let err = within(&ctx, "reading", "Linux Web App", &"/sites/web", step)
            .await
            .unwrap_err();

        assert_eq!(err.summary, "Failed reading Linux Web App");
        assert_eq!(
            err.detail,
            "reading Linux Web App /sites/web: waiting for completion: context deadline exceeded"
        );
    }

    #[tokio::test]
    async fn within_passes_step_result_through() {
        let ctx = Context::new();
        let err = within(&ctx, "reading", "Linux Web App", &"/sites/web", async {
            Err::<(), _>(Diagnostic::error("boom", "detail"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.summary, "boom");
    }

    #[test]
    fn provider_data_must_be_app_service_data() {
        let err = extract_provider_data(None).unwrap_err();
        assert_eq!(err.summary, "No provider data");

        let wrong: Arc<dyn Any + Send + Sync> = Arc::new("not provider data".to_string());
        let err = extract_provider_data(Some(wrong)).unwrap_err();
        assert_eq!(err.summary, "Invalid provider data");
    }
}
