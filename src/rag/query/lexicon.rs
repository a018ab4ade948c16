//! Stopwords and domain synonyms used by the query optimizer
//!
//! Every entry is stored in folded form (lowercase, no diacritics) so it can be
//! compared directly against optimizer tokens.

use std::collections::{HashMap, HashSet};

const STOPWORDS: &[&str] = &[
    // Spanish
    "a", "al", "algo", "algun", "alguna", "algunos", "ante", "como", "con", "cual", "cuales",
    "cuando", "cuanta", "cuantas", "cuanto", "cuantos", "de", "del", "donde", "e", "el", "ella",
    "ellos", "en", "entre", "era", "es", "esa", "ese", "eso", "esta", "estan", "este", "esto",
    "estos", "estas", "fue", "ha", "hay", "la", "las", "le", "les", "lo", "los", "mas", "me", "mi",
    "mis", "muy", "nos", "o", "para", "pero", "por", "que", "quien", "se", "sea", "ser", "si",
    "sin", "sobre", "son", "su", "sus", "te", "tu", "tus", "u", "un", "una", "unas", "unos", "y",
    "ya", "yo",
    // English
    "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it", "of",
    "on", "or", "the", "to", "what", "when", "where", "which", "who", "with",
];

const SYNONYMS: &[(&str, &[&str])] = &[
    ("vacaciones", &["descanso", "permiso", "licencia"]),
    ("permiso", &["licencia", "ausencia"]),
    ("licencia", &["permiso", "ausencia"]),
    ("salario", &["sueldo", "remuneracion", "nomina"]),
    ("sueldo", &["salario", "nomina"]),
    ("nomina", &["salario", "pago"]),
    ("horario", &["jornada", "turno"]),
    ("jornada", &["horario", "turno"]),
    ("contrato", &["convenio", "acuerdo"]),
    ("despido", &["desvinculacion", "cese"]),
    ("renuncia", &["dimision", "baja"]),
    ("capacitacion", &["formacion", "entrenamiento", "curso"]),
    ("beneficios", &["prestaciones", "compensaciones"]),
    ("teletrabajo", &["remoto", "distancia"]),
    ("seguro", &["poliza", "cobertura"]),
    ("gastos", &["viaticos", "reembolso"]),
    ("viaticos", &["gastos", "reembolso"]),
    ("incapacidad", &["baja", "enfermedad"]),
    ("politica", &["norma", "reglamento", "procedimiento"]),
    ("evaluacion", &["desempeno", "revision"]),
    ("ascenso", &["promocion"]),
    ("uniforme", &["vestimenta", "dotacion"]),
];

/// Stopword set and synonym dictionary
#[derive(Debug, Clone)]
pub struct Lexicon {
    stopwords: HashSet<String>,
    synonyms: HashMap<String, Vec<String>>,
}

impl Lexicon {
    /// Built-in corporate HR/policy vocabulary
    pub fn corporate() -> Self {
        Self::from_parts(
            STOPWORDS.iter().copied(),
            SYNONYMS
                .iter()
                .map(|(term, alts)| (*term, alts.iter().copied().collect::<Vec<_>>())),
        )
    }

    /// Build a lexicon from arbitrary entries; entries are folded on the way in
    pub fn from_parts<'a, S, M>(stopwords: S, synonyms: M) -> Self
    where
        S: IntoIterator<Item = &'a str>,
        M: IntoIterator<Item = (&'a str, Vec<&'a str>)>,
    {
        Self {
            stopwords: stopwords.into_iter().map(fold).collect(),
            synonyms: synonyms
                .into_iter()
                .map(|(term, alts)| (fold(term), alts.into_iter().map(fold).collect()))
                .collect(),
        }
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn synonyms(&self, token: &str) -> &[String] {
        self.synonyms.get(token).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::corporate()
    }
}

/// Combining diacritical marks block, as left behind by decomposed input
const COMBINING_MARKS: std::ops::RangeInclusive<char> = '\u{300}'..='\u{36f}';

/// Lowercase and strip diacritics, precomposed or decomposed
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| !COMBINING_MARKS.contains(c))
        .map(strip_diacritic)
        .collect()
}

fn strip_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}
