pub mod scan;
pub mod webhook;


pub use scan::scan_open_prs;
pub use webhook::handle_webhook;

use actix_web::web;

/// Configure moderation routes under /api
pub fn configure_mod_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/mod")
            .route("/webhook", web::post().to(handle_webhook))
            .route("", web::get().to(scan_open_prs)),
    );
}
