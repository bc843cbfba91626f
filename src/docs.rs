//! OpenAPI document and the two browsable renderings of it.

use axum::{response::Html, routing::get, Json, Router};
use utoipa::OpenApi;

use crate::api;
use crate::error::{ErrorOut, ValidationErrorOut};
use crate::types::{CropEncodingOut, MessageOut, PredictionOut, PredictionRequest};
use crate::validate::{FieldViolation, ViolationKind};

pub const OPENAPI_URL: &str = "/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hydroponic pH Prediction API",
        version = "1.0.0",
        description = "This API predicts the optimal pH level for hydroponic farming based on key soil and environmental factors."
    ),
    paths(api::root, api::crop_encoding, api::predict),
    components(schemas(
        PredictionRequest,
        PredictionOut,
        CropEncodingOut,
        MessageOut,
        ErrorOut,
        ValidationErrorOut,
        FieldViolation,
        ViolationKind,
    ))
)]
pub struct ApiDoc;

const SWAGGER_HTML: &str = r##"<!DOCTYPE html>
<html>
<head>
<title>Hydroponic pH Prediction API - Swagger UI</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>
SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
</script>
</body>
</html>
"##;

const REDOC_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Hydroponic pH Prediction API - ReDoc</title>
<meta charset="utf-8"/>
</head>
<body>
<redoc spec-url="/openapi.json"></redoc>
<script src="https://cdn.jsdelivr.net/npm/redoc@2/bundles/redoc.standalone.js"></script>
</body>
</html>
"#;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_HTML)
}

async fn redoc() -> Html<&'static str> {
    Html(REDOC_HTML)
}

pub fn routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(OPENAPI_URL, get(openapi_json))
        .route("/docs", get(swagger_ui))
        .route("/redoc", get(redoc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for p in ["/", "/crop-encoding", "/predict"] {
            assert!(paths.contains_key(p), "missing {p}");
        }
        assert_eq!(doc["info"]["version"], "1.0.0");
    }

    #[test]
    fn swagger_page_mounts_on_its_div() {
        assert!(SWAGGER_HTML.contains(r##"dom_id: "#swagger-ui""##));
        assert!(SWAGGER_HTML.trim_end().ends_with("</html>"));
        assert!(REDOC_HTML.contains(OPENAPI_URL));
    }

    #[test]
    fn request_schema_carries_ranges() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let props = &doc["components"]["schemas"]["PredictionRequest"]["properties"];
        assert_eq!(props["potassium"]["maximum"], 300.0);
        assert_eq!(props["crop"]["maximum"], 12.0);
        assert_eq!(props["soil_ec"]["minimum"], 0.0);
    }
}
