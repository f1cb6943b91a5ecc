//! Data Preparation
//!
//! Utilities that produce instance files rather than consume them: conversion from the
//! OR-Library capacitated warehouse location format, and named generators for
//! side-constraint data.

pub mod orlib;
pub mod rules;
