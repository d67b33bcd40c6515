use okapi::{Map, openapi3::RefOr};
use rocket::{Request, http::Status, response::Responder, serde::json::Json};
use rocket_dyn_templates::{Template, context};
use rocket_okapi::{JsonSchema, r#gen::OpenApiGenerator, response::OpenApiResponderInner};
use serde::{Deserialize, Serialize};

use crate::{auth_client::AuthError, riot_client::RiotError};

#[derive(Serialize, Deserialize, JsonSchema)]
struct ErrorMessageInner {
    message: String,
}

#[derive(Debug)]
pub enum ApiErrors {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    /// Failure reported by an upstream service, carrying the status code the
    /// upstream answered with.
    Upstream(u16, String),
    InternalError(String),
}

impl ApiErrors {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiErrors::NotFound(_) => 404,
            ApiErrors::BadRequest(_) => 400,
            ApiErrors::Unauthorized(_) => 401,
            ApiErrors::Upstream(code, _) => {
                if Status::from_code(*code).is_some() {
                    *code
                } else {
                    502
                }
            }
            ApiErrors::InternalError(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiErrors::NotFound(msg) => msg,
            ApiErrors::BadRequest(msg) => msg,
            ApiErrors::Unauthorized(msg) => msg,
            ApiErrors::Upstream(_, msg) => msg,
            ApiErrors::InternalError(msg) => msg,
        }
    }

    pub fn default_message(&self) -> &str {
        match self {
            ApiErrors::NotFound(_) => "Not Found",
            ApiErrors::BadRequest(_) => "Bad Request",
            ApiErrors::Unauthorized(_) => "Unauthorized",
            ApiErrors::Upstream(_, _) => "Bad Gateway",
            ApiErrors::InternalError(_) => "Internal Server Error",
        }
    }
}

impl From<&str> for ApiErrors {
    fn from(message: &str) -> Self {
        ApiErrors::InternalError(message.to_string())
    }
}

impl From<String> for ApiErrors {
    fn from(message: String) -> Self {
        ApiErrors::InternalError(message)
    }
}

impl From<RiotError> for ApiErrors {
    fn from(err: RiotError) -> Self {
        match err {
            RiotError::Status(code, _) => {
                ApiErrors::Upstream(code, format!("Game API request failed with status {}", code))
            }
            RiotError::Http(e) => {
                log::error!("Game API unreachable: {}", e);
                ApiErrors::Upstream(502, "Game API unreachable".into())
            }
            RiotError::PuuidNotInMatch(puuid, match_id) => ApiErrors::BadRequest(format!(
                "Account {} is not a participant of match {}",
                puuid, match_id
            )),
        }
    }
}

impl From<AuthError> for ApiErrors {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected(msg) => ApiErrors::Unauthorized(msg),
            AuthError::Http(e) => {
                log::error!("Identity service unreachable: {}", e);
                ApiErrors::Upstream(502, "Identity service unreachable".into())
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiErrors {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        let accepts_html = request
            .headers()
            .get("Accept")
            .any(|accept| accept.contains("text/html"));

        if accepts_html {
            // Render HTML error page
            let template = Template::render(
                "error",
                context! {
                    code: self.status_code().to_string(),
                    message: self.message()
                },
            );
            template.respond_to(request)
        } else {
            // Render JSON error
            let json_response = Json(ErrorMessageInner {
                message: self.message().to_string(),
            });

            let status = self.status_code();
            let mut response = json_response.respond_to(request)?;
            response.set_status(Status::from_code(status).unwrap_or(Status::InternalServerError));
            Ok(response)
        }
    }
}

impl OpenApiResponderInner for ApiErrors {
    fn responses(gene: &mut OpenApiGenerator) -> rocket_okapi::Result<okapi::openapi3::Responses> {
        let mut responses = Map::new();

        for (code, description) in [
            ("400", "Bad Request"),
            ("401", "Unauthorized"),
            ("404", "Not Found"),
            ("500", "Internal Server Error"),
            ("502", "Bad Gateway"),
        ] {
            responses.insert(
                code.to_string(),
                RefOr::Object(okapi::openapi3::Response {
                    description: description.to_string(),
                    content: Map::from([(
                        "application/json".to_string(),
                        okapi::openapi3::MediaType {
                            schema: Some(gene.json_schema::<ErrorMessageInner>()),
                            ..Default::default()
                        },
                    )]),
                    ..Default::default()
                }),
            );
        }

        Ok(okapi::openapi3::Responses {
            responses,
            ..Default::default()
        })
    }
}
