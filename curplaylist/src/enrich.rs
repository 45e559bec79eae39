//! Annotateur optionnel des noms de fichiers

use chrono::NaiveDate;

/// Résultat d'un enrichissement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub cleaned_name: Option<String>,
    pub tags: Vec<String>,
    pub extracted_date: Option<NaiveDate>,
}

/// Collaborateur externe capable de nettoyer ou d'annoter un nom de fichier.
///
/// Une implémentation peut échouer ou ne rien proposer (`None`) ; le rédacteur
/// de manifeste se comporte alors exactement comme en son absence.
pub trait Enricher: Send + Sync {
    fn enrich(&self, file_name: &str) -> anyhow::Result<Option<Enrichment>>;
}
