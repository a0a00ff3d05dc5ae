//! Frontera con los handlers: traduce el resultado del engine a una clase de
//! respuesta, un status HTTP sugerido y un cuerpo JSON. El engine no conoce
//! códigos de transporte.
use apqp_core::{ApprovalError, Outcome};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    ClientError,
    ServerError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub class: ResponseClass,
    pub status: u16,
    pub body: Value,
}

pub fn classify<T>(res: &Result<Outcome<T>, ApprovalError>) -> ResponseClass {
    match res {
        Ok(o) if o.is_success() => ResponseClass::Success,
        Ok(_) => ResponseClass::ClientError,
        Err(_) => ResponseClass::ServerError,
    }
}

pub fn http_status<T>(res: &Result<Outcome<T>, ApprovalError>) -> u16 {
    match res {
        Ok(Outcome::Ok(_)) | Ok(Outcome::DuplicateSkipped(_)) => 200,
        Ok(Outcome::NotFound(_)) => 404,
        Ok(Outcome::ValidationFailed(_)) => 400,
        Err(_) => 500,
    }
}

/// Código de salida de los binarios: 0 ok, 3 validación, 4 no encontrado,
/// 5 error de servidor. El 2 (uso) lo decide el parser de argumentos.
pub fn exit_code<T>(res: &Result<Outcome<T>, ApprovalError>) -> i32 {
    match res {
        Ok(Outcome::Ok(_)) | Ok(Outcome::DuplicateSkipped(_)) => 0,
        Ok(Outcome::ValidationFailed(_)) => 3,
        Ok(Outcome::NotFound(_)) => 4,
        Err(_) => 5,
    }
}

pub fn respond<T: Serialize>(res: Result<Outcome<T>, ApprovalError>) -> Response {
    let class = classify(&res);
    let status = http_status(&res);
    let body = match &res {
        Ok(outcome) => serde_json::to_value(outcome).unwrap_or_else(|e| json!({ "error": format!("serialize: {e}") })),
        Err(e) => json!({ "error": e.to_string() }),
    };
    Response { class, status, body }
}
