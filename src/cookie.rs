use okapi::openapi3::{Object, Parameter};
use rocket::{
    Request, State,
    http::Status,
    request::{FromRequest, Outcome},
};
use rocket_okapi::{r#gen::OpenApiGenerator, request::OpenApiFromRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth_client::AuthClient;

/// Authenticated caller, resolved from the private session cookie (HTML
/// flows) or a bearer token validated against the identity service.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiUser {
    pub id: Uuid,
    pub email: String,
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<'r> FromRequest<'r> for ApiUser {
    type Error = String;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if let Some(cookie) = request.cookies().get_private("auth") {
            if let Ok(user) = serde_json::from_str(cookie.value()) {
                return Outcome::Success(user);
            } else {
                return Outcome::Error((Status::Unauthorized, "Malformed auth cookie".to_string()));
            }
        } else if let Some(authorization) = request.headers().get_one("Authorization") {
            let Some(token) = bearer_token(authorization) else {
                return Outcome::Error((
                    Status::Unauthorized,
                    "Invalid authentication scheme".to_string(),
                ));
            };

            if let Outcome::Success(auth_client) = request.guard::<&State<AuthClient>>().await {
                if let Some(user) = auth_client.get_user(token).await {
                    return Outcome::Success(ApiUser {
                        id: user.id,
                        email: user.email,
                    });
                }
            }

            return Outcome::Error((
                Status::Unauthorized,
                "Invalid or expired token".to_string(),
            ));
        }

        Outcome::Error((
            Status::Unauthorized,
            "Missing authorization header".to_string(),
        ))
    }
}

impl<'a> OpenApiFromRequest<'a> for ApiUser {
    fn from_request_input(
        gene: &mut OpenApiGenerator,
        _name: String,
        required: bool,
    ) -> rocket_okapi::Result<rocket_okapi::request::RequestHeaderInput> {
        let schema = gene.json_schema::<String>();

        Ok(rocket_okapi::request::RequestHeaderInput::Parameter(
            Parameter {
                name: "Authorization".to_owned(),
                location: "header".to_owned(),
                description: Some("Bearer access token issued by the identity service".to_owned()),
                required,
                deprecated: false,
                allow_empty_value: false,
                value: rocket_okapi::okapi::openapi3::ParameterValue::Schema {
                    style: None,
                    explode: None,
                    allow_reserved: false,
                    schema,
                    example: None,
                    examples: None,
                },
                extensions: Object::default(),
            },
        ))
    }
}
