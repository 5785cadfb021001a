pub mod issuer;
pub mod mailer;
pub mod payments;
pub mod quota;
pub mod validator;
