use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::ServerBuilder;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{Permission, Role};
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::refresh,
		routes::auth::me,
		routes::auth::logout,
		routes::profile::get_profile,
		routes::profile::update_profile,
		routes::profile::change_password,
		routes::users::list_users,
		routes::users::create_user,
		routes::users::get_user,
		routes::users::update_user,
		routes::users::delete_user,
		routes::categories::list_categories,
		routes::categories::get_category,
		routes::categories::create_category,
		routes::categories::update_category,
		routes::categories::delete_category,
		routes::reports::list_reports,
		routes::reports::create_report,
		routes::reports::get_report,
		routes::reports::update_report,
		routes::reports::delete_report,
		routes::reports::audit_report,
		routes::found_items::list_found_items,
		routes::found_items::create_found_item,
		routes::found_items::get_found_item,
		routes::found_items::update_found_item,
		routes::found_items::claim_found_item,
		routes::found_items::delete_found_item,
		routes::activity::list_activity
	),
	components(
		schemas(
			Role,
			Permission,
			routes::MessageResponse,
			routes::health::HealthResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::user::ProfileUpdateRequest,
			models::user::ChangePasswordRequest,
			models::user::ProfileResponse,
			models::category::Category,
			models::category::CategoryCreateRequest,
			models::category::CategoryUpdateRequest,
			models::report::Report,
			models::report::ReportStatus,
			models::report::ReportCreateRequest,
			models::report::ReportUpdateRequest,
			models::report::ReportStatusRequest,
			models::found_item::FoundItem,
			models::found_item::FoundItemStatus,
			models::found_item::FoundItemCreateRequest,
			models::found_item::FoundItemUpdateRequest,
			models::found_item::ClaimRequest,
			models::activity::ActivityEntry
		)
	),
	modifiers(&SecurityAddon),
	tags(
		(name = "Health", description = "Liveness and database check"),
		(name = "Auth", description = "Registration, login and token rotation"),
		(name = "Profile", description = "The caller's own account"),
		(name = "Users", description = "Account administration (ADMIN)"),
		(name = "Categories", description = "Item categories"),
		(name = "Reports", description = "Lost-item reports"),
		(name = "Found Items", description = "Found items and claims"),
		(name = "Activity", description = "Audit log (ADMIN)")
	)
)]
pub struct ApiDoc;

/// Registers the `bearerAuth` scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![ServerBuilder::new().url(server_url(port)).build()]);
	Ok(doc)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn server_url(port: u16) -> String {
	// Swagger's Try-it-out must call back over TLS when the server terminates TLS itself.
	let tls_enabled = std::env::var("TLS_CERT_PATH").is_ok() && std::env::var("TLS_KEY_PATH").is_ok();
	let scheme = if tls_enabled { "https" } else { "http" };
	format!("{}://localhost:{}", scheme, port)
}
