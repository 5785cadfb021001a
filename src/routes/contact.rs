use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::api::AppContext;
use crate::error::DemoAccessError;
use crate::models::contact::NewContact;
use crate::models::requests::ContactForm;

#[utoipa::path(
    post,
    path = "/api/contact",
    tag = "Contact",
    request_body = ContactForm,
    responses(
        (status = 201, description = "Submission stored"),
        (status = 400, description = "Invalid submission"),
        (status = 429, description = "Too many submissions"),
    )
)]
pub async fn submit_contact(
    State(context): State<AppContext>,
    Json(form): Json<ContactForm>,
) -> Result<(StatusCode, Json<serde_json::Value>), DemoAccessError> {
    validate_contact_form(&form)?;

    let submission = context
        .storage
        .create_contact(NewContact {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            project_type: form.project_type,
            budget: form.budget,
            message: form.message.trim().to_string(),
        })
        .await?;

    tracing::info!("contact submission {} received", submission.id);

    // Notification failure never affects the response; the row is persisted.
    let mailer = context.mailer.clone();
    tokio::spawn(async move {
        mailer.send_contact_notification(&submission).await;
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Contact form submitted successfully" })),
    ))
}

fn validate_contact_form(form: &ContactForm) -> Result<(), DemoAccessError> {
    // Bots that fill hidden fields get the same success-shaped rejection
    // a human validation error would, with no hint which field tripped.
    if form.tripped_honeypot() {
        return Err(DemoAccessError::Validation(
            "Invalid form submission".to_string(),
        ));
    }

    let name = form.name.trim();
    if name.len() < 2 || name.len() > 100 {
        return Err(DemoAccessError::Validation(
            "Name must be between 2 and 100 characters".to_string(),
        ));
    }

    let email = form.email.trim();
    if !is_plausible_email(email) {
        return Err(DemoAccessError::Validation(
            "A valid email address is required".to_string(),
        ));
    }

    let message = form.message.trim();
    if message.len() < 10 || message.len() > 2000 {
        return Err(DemoAccessError::Validation(
            "Message must be between 10 and 2000 characters".to_string(),
        ));
    }

    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    if email.len() > 254 || email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
