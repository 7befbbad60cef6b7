//! Switchboard - one chat API in front of many LLM providers, with per-session memory.

// ============================================================================
// Core Infrastructure
// ============================================================================

pub mod build_info;
pub mod config;

// ============================================================================
// Server & HTTP
// ============================================================================

pub mod access;
pub mod handlers;
pub mod response;
pub mod server;

// ============================================================================
// Domain
// ============================================================================

pub mod catalog;
pub mod llm;
pub mod orchestrator;
pub mod session;
