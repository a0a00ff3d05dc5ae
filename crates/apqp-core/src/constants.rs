//! Constantes del motor de aprobaciones.
//!
//! Los literales de texto aquí definidos forman parte del contrato con la base
//! de datos (columnas TEXT con CHECK) y con la UI que consume las proyecciones.

/// Valor inicial de `round` para todo registro recién creado (Leader o PJ).
pub const INITIAL_ROUND: i32 = 0;

/// Valores aceptados como decisión. Cualquier otro valor se rechaza antes de
/// abrir la transacción.
pub const VALID_DECISIONS: [&str; 5] = ["done", "inprogress", "delay", "reject", "waiting"];
