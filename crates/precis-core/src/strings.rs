//! User-visible message strings (French).
//!
//! Centralised so the bot speaks with one voice across the orchestrator and
//! the Discord front-end.

pub const THREAD_CREATED: &str = "Création thread automatique";
pub const CONTENT_FETCHING: &str = "Récupération du contenu…";
pub const SUMMARIZING: &str = "Traitement du contenu pour la génération du résumé…";
pub const SUMMARY_TITLE: &str = "📝 Résumé";

pub fn content_fetched(source: &str) -> String {
    format!("Contenu récupéré depuis {source}")
}

pub fn duplicate_detected(thread_url: &str) -> String {
    format!("Ce lien a déjà été traité dans le fil de discussion: {thread_url}")
}

pub fn duplicate_without_thread(url: &str) -> String {
    format!("Ce lien a déjà été traité: {url}")
}

pub fn stage_failed(stage: &str, error: &str) -> String {
    format!("Échec à l'étape {stage}: {error}")
}
