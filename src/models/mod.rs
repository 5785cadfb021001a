pub mod app;
pub mod contact;
pub mod purchase;
pub mod requests;
pub mod responses;
pub mod session;
pub mod testimonial;
