//! Prompt augmentation and user-facing answer texts
//!
//! Every answer leaving the pipeline, generated or fallback, carries
//! [`DISCLAIMER`].

/// Trailing notice marking AI authorship
pub const DISCLAIMER: &str = "\n\n---\n_Respuesta generada por IA a partir de documentos \
internos. Verifica la información importante con el área responsable._";

/// Answer when retrieval found nothing relevant
pub const NO_RESULTS_ANSWER: &str = "No encontré información relevante en los documentos \
disponibles para responder tu pregunta. Intenta reformularla o consulta directamente con el \
área correspondiente.";

/// Answer when the document search exceeded its budget
pub const RETRIEVAL_TIMEOUT_ANSWER: &str = "La búsqueda en los documentos está tardando más de \
lo esperado. Por favor, intenta de nuevo en unos momentos.";

/// Answer when generation exceeded its budget
pub const GENERATION_TIMEOUT_ANSWER: &str = "Encontré documentos relacionados, pero la \
generación de la respuesta tardó demasiado. Por favor, intenta de nuevo en unos momentos.";

/// Answer for any other upstream failure
pub const FAILURE_ANSWER: &str = "Lo siento, ocurrió un problema al procesar tu pregunta. \
Por favor, intenta de nuevo más tarde.";

const INSTRUCTIONS: &str = "Eres un asistente que responde preguntas de empleados usando \
únicamente los documentos internos proporcionados. Si la respuesta no está en los documentos, \
dilo claramente. Responde en el mismo idioma de la pregunta, de forma breve y precisa, y cita \
el número de documento cuando sea útil.";

/// Build the generation prompt from assembled context and the user's question
pub fn augment(context: &str, query: &str) -> String {
    format!(
        "{}\n\nDocumentos:\n{}\n\nPregunta: {}\n\nRespuesta:",
        INSTRUCTIONS,
        context,
        query.trim()
    )
}

/// Append the disclaimer to an answer body
pub fn with_disclaimer(answer: &str) -> String {
    format!("{}{}", answer.trim_end(), DISCLAIMER)
}
