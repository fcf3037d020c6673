//! Suggestion text: the deterministic local table and the prompt templates
//! sent to the generative provider. Both are keyed by (language, severity)
//! and cover every combination, so lookup can never fall through.

use crate::assessment::{Concern, Language, Severity};

/// Hard cap on suggestion text kept in a record. Bounds storage and guards
/// against pathological provider output.
pub const SUGGESTION_MAX_CHARS: usize = 500;

/// Deterministic fallback suggestion, always available regardless of the
/// remote provider's state.
pub fn local_suggestion(severity: Severity, language: Language) -> &'static str {
    match (language, severity) {
        (Language::En, Severity::None) => {
            "No significant depressive symptoms detected. Keep up healthy routines and social support."
        }
        (Language::En, Severity::Mild) => {
            "Mild symptoms detected. Try self-care routines, good sleep, and monitor your mood."
        }
        (Language::En, Severity::Moderate) => {
            "Moderate symptoms detected. Consider speaking with a mental health professional."
        }
        (Language::En, Severity::Severe) => {
            "Severe symptoms detected. Please seek professional help promptly or emergency services if needed."
        }
        (Language::Id, Severity::None) => {
            "Respons Anda menunjukkan tidak ada gejala depresi yang signifikan. Pertahankan kebiasaan sehat dan dukungan sosial."
        }
        (Language::Id, Severity::Mild) => {
            "Gejala ringan terdeteksi. Coba rutinitas perawatan diri, tidur cukup, dan pantau suasana hati Anda."
        }
        (Language::Id, Severity::Moderate) => {
            "Gejala sedang terdeteksi. Pertimbangkan untuk berkonsultasi dengan profesional kesehatan mental."
        }
        (Language::Id, Severity::Severe) => {
            "Gejala berat terdeteksi. Sangat disarankan untuk segera mencari bantuan profesional atau layanan darurat jika diperlukan."
        }
    }
}

/// Render notable concerns as a locale-specific parenthetical clause, e.g.
/// `" (specific concerns: suicidalIdeation=6, panicAttacks=5)"`. Empty
/// string when there are no concerns.
pub fn concern_clause(concerns: &[Concern], language: Language) -> String {
    if concerns.is_empty() {
        return String::new();
    }
    let pairs = concerns
        .iter()
        .map(|c| format!("{}={}", c.field, c.score))
        .collect::<Vec<_>>()
        .join(", ");
    match language {
        Language::En => format!(" (specific concerns: {pairs})"),
        Language::Id => format!(" (kekhawatiran spesifik: {pairs})"),
    }
}

/// Build the full prompt for the generative provider: a severity- and
/// locale-specific instruction, with the concern clause spliced in when any
/// scores crossed the threshold.
pub fn build_prompt(severity: Severity, language: Language, concerns: &[Concern]) -> String {
    let specific = concern_clause(concerns, language);
    match language {
        Language::En => match severity {
            Severity::None => format!(
                "A user's mental health assessment indicates no significant depressive symptoms.{specific} \
                 Provide a brief, encouraging, and supportive suggestion (1-2 sentences) for maintaining good mental well-being. \
                 If there were specific minor concerns mentioned, subtly acknowledge them if appropriate while maintaining a positive tone."
            ),
            Severity::Mild => format!(
                "A user's mental health assessment indicates mild depressive symptoms.{specific} \
                 Provide a brief, supportive suggestion (1-2 sentences) focusing on self-care, monitoring mood, and addressing any specifically mentioned concerns."
            ),
            Severity::Moderate => format!(
                "A user's mental health assessment indicates moderate depressive symptoms.{specific} \
                 Provide a brief, supportive suggestion (2-3 sentences) encouraging them to consider talking to a mental health professional, \
                 especially highlighting the importance of addressing the specifically mentioned concerns."
            ),
            Severity::Severe => format!(
                "A user's mental health assessment indicates severe depressive symptoms.{specific} \
                 Provide a brief, supportive, and empathetic suggestion (2-3 sentences) strongly recommending they seek professional help immediately. \
                 Emphasize the seriousness of any specifically mentioned concerns like suicidal ideation."
            ),
        },
        Language::Id => {
            let base = match severity {
                Severity::None => format!(
                    "Hasil asesmen kesehatan mental pengguna menunjukkan tidak ada gejala depresi yang signifikan.{specific} \
                     Berikan saran singkat (1-2 kalimat) yang memberi semangat dan suportif untuk menjaga kesehatan mental yang baik. \
                     Jika ada kekhawatiran kecil spesifik yang disebutkan, akui secara halus jika sesuai sambil mempertahankan nada positif."
                ),
                Severity::Mild => format!(
                    "Hasil asesmen kesehatan mental pengguna menunjukkan gejala depresi ringan.{specific} \
                     Berikan saran singkat (1-2 kalimat) yang suportif, fokus pada perawatan diri, pemantauan suasana hati, dan mengatasi kekhawatiran spesifik yang disebutkan."
                ),
                Severity::Moderate => format!(
                    "Hasil asesmen kesehatan mental pengguna menunjukkan gejala depresi sedang.{specific} \
                     Berikan saran singkat (2-3 kalimat) yang suportif, mendorong mereka untuk mempertimbangkan berbicara dengan profesional kesehatan mental, \
                     terutama menyoroti pentingnya mengatasi kekhawatiran spesifik yang disebutkan."
                ),
                Severity::Severe => format!(
                    "Hasil asesmen kesehatan mental pengguna menunjukkan gejala depresi berat.{specific} \
                     Berikan saran singkat (2-3 kalimat) yang suportif dan empatik, sangat merekomendasikan mereka untuk segera mencari bantuan profesional. \
                     Tekankan keseriusan setiap kekhawatiran spesifik yang disebutkan seperti ide bunuh diri."
                ),
            };
            format!("{base} Pastikan saran tersebut empatik dan dapat ditindaklanjuti. Berikan jawaban dalam Bahasa Indonesia.")
        }
    }
}

/// Trim and cap provider output at [`SUGGESTION_MAX_CHARS`] characters.
pub fn clamp_suggestion(text: &str) -> String {
    text.trim().chars().take(SUGGESTION_MAX_CHARS).collect()
}
