use thiserror::Error;

pub type Result<T> = std::result::Result<T, StampError>;

/// Failures of a single stamping attempt. None of them are retried internally;
/// the caller keeps its inputs and may re-run the whole attempt.
#[derive(Debug, Error)]
pub enum StampError {
    #[error("no se pudo leer el documento: {0}")]
    Decode(String),

    #[error("no se pudo incrustar la imagen: {0}")]
    Embed(String),

    #[error("la selección no contiene ninguna página")]
    NoTargetPages,

    #[error("la página {index} está fuera de un documento de {page_count} páginas")]
    PageOutOfRange { index: usize, page_count: usize },

    #[error("tamaño de área de trabajo {width}x{height} inválido")]
    InvalidWorkspace { width: f64, height: f64 },

    #[error("colocación inválida: {0}")]
    InvalidPlacement(String),

    #[error("no hay firma ni imagen que colocar")]
    MissingOverlay,

    #[error("no se pudo escribir el documento: {0}")]
    Serialize(String),
}

impl StampError {
    /// Short message meant for the person operating the tool.
    pub fn user_message(&self) -> &'static str {
        match self {
            StampError::Decode(_) => "El archivo no es un PDF válido. Elige otro archivo.",
            StampError::Embed(_) => {
                "La imagen de firma o marca de agua está dañada o no es compatible. Vuelve a crearla o subirla."
            }
            StampError::NoTargetPages | StampError::PageOutOfRange { .. } => {
                "No se seleccionó ninguna página válida. Revisa los números y rangos."
            }
            StampError::InvalidWorkspace { .. } => "El área de edición todavía no tiene tamaño. Inténtalo de nuevo.",
            StampError::InvalidPlacement(_) => "La posición, el tamaño o la rotación no son válidos. Vuelve a colocarla.",
            StampError::MissingOverlay => "Primero dibuja, escribe o sube algo que colocar.",
            StampError::Serialize(_) => "No se pudo generar el PDF. Inténtalo de nuevo.",
        }
    }
}
