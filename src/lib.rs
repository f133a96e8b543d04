pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod notification;
pub mod pricing;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
