//! Loan Funnel Library
//!
//! This library provides the core functionality of the loan application
//! funnel: applicant validation, the session-scoped profile store, the loan
//! catalog, the eligibility and application steps, payment collection and
//! the HTTP handlers exposing them.
//!
//! # Modules
//!
//! - `api`: API-layer components.
//! - `core`: Domain logic (steps, validation, catalog).
//! - `integrations`: Payment gateway integration.
//! - `application`: Application step state machine.
//! - `catalog`: Fixed loan catalog and display formatting.
//! - `circuit_breaker`: Circuit breaker for the payment gateway.
//! - `config`: Configuration management.
//! - `eligibility`: Eligibility step state machine.
//! - `errors`: HTTP error mapping.
//! - `gateway_client`: Push payment gateway client.
//! - `handlers`: HTTP request handlers and session middleware.
//! - `models`: Core data models.
//! - `navigation`: Routes and entry guards.
//! - `payment`: Payment attempts, strategies and in-flight tracking.
//! - `session_store`: Session-scoped storage and the applicant profile store.
//! - `validation`: Applicant profile validation and phone normalization.

pub mod api;
pub mod core;
pub mod integrations;

pub mod application;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod eligibility;
pub mod errors;
pub mod gateway_client;
pub mod handlers;
pub mod models;
pub mod navigation;
pub mod payment;
pub mod session_store;
pub mod validation;
