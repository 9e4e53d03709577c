//! OpenAPI documentation for the relay endpoints.

use utoipa::OpenApi;

use crate::api;
use crate::api::models::{callbacks, results};
use crate::types;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "cbrelay",
        description = "Callback relay: a workflow engine delivers asynchronous estimate results, \
        the original requester polls for them by correlation id. Results stay available for a fixed TTL after their latest write."
    ),
    paths(
        api::handlers::callbacks::receive_callback,
        api::handlers::results::poll_result,
        api::handlers::results::poll_status,
    ),
    components(schemas(
        callbacks::CallbackRequest,
        callbacks::CallbackAck,
        results::PollResponse,
        results::PollStatus,
        types::ResultEntry,
        types::ResultStatus,
    )),
    tags(
        (name = "callbacks", description = "Result delivery from the workflow engine"),
        (name = "results", description = "Polling by the original requester"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_relay_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        assert!(paths.iter().any(|p| p.as_str() == "/callback"));
        assert!(paths.iter().any(|p| p.as_str() == "/result"));
        assert!(paths.iter().any(|p| p.as_str() == "/status/{callbackId}"));
    }
}
