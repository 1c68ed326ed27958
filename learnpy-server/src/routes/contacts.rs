//! Contact form
//!
//! POST /contacts

use crate::services::session::CurrentUser;
use crate::AppState;
use actix_web::{post, web, HttpResponse};
use learnpy_common::types::ContactInput;
use learnpy_common::Result;
use validator::Validate;

#[post("/contacts")]
pub async fn create_contact(
    state: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<ContactInput>,
) -> Result<HttpResponse> {
    body.validate()?;

    let contact = state.db.contacts.create(&user.username, &body).await?;
    Ok(HttpResponse::Created().json(contact))
}
