#![allow(dead_code)]

pub mod data_env;
pub mod fake_service;
