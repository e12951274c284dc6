use utoipa::OpenApi;
use utoipa::openapi::{Contact, InfoBuilder, License, Tag};

use super::error::ErrorBody;
use super::handlers::{
    auth::{self, LoginResponse, OkResponse, RefreshRequest},
    health::{self, Health},
};

#[derive(OpenApi)]
#[openapi(
    paths(health::health, auth::login, auth::refresh, auth::logout),
    components(schemas(Health, LoginResponse, OkResponse, RefreshRequest, ErrorBody))
)]
struct GatewayDoc;

/// `OpenAPI` document for the endpoints the gateway answers itself.
///
/// Proxied `/api/*` routes belong to the backend and are not described here.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = GatewayDoc::openapi();

    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();
    doc.info = info;

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and build information".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Gateway-issued token lifecycle".to_string());

    doc.tags = Some(vec![health_tag, auth_tag]);
    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            optional_str(name),
            optional_str(email.trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}
