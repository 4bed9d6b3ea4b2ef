//! Brand gazetteer — free text to canonical brand names.
//!
//! Aliases are matched on whole tokens. Cyrillic aliases of four or more
//! letters also accept a short case ending ("мерседеса", "хавалом").

use std::collections::BTreeSet;

use crate::text::{normalize, words};

/// Brands the dealership sells new.
pub const DEFAULT_DEALER_BRANDS: &[&str] = &["Chery", "Jetour", "Haval"];

/// Brands serviced by the Chery-family workshop and parts desk.
pub const DEFAULT_ECOSYSTEM_BRANDS: &[&str] = &["Chery", "Jetour", "Omoda", "Tenet", "Jaecoo"];

const MIN_INFLECTABLE: usize = 4;

/// Case endings accepted after a Cyrillic alias.
const CASE_ENDINGS: &[&str] = &["а", "у", "е", "ы", "и", "ю", "ом", "ой", "ем", "ах", "ам", "ов"];

/// (canonical name, aliases). Aliases are lower-case with `ё` folded.
const GAZETTEER: &[(&str, &[&str])] = &[
    ("Chery", &["chery", "чери", "черри", "tiggo", "тигго", "arrizo", "аризо"]),
    ("Jetour", &["jetour", "джетур", "жетур", "dashing", "дашинг"]),
    ("Haval", &["haval", "хавал", "хавейл", "хавэйл", "jolion", "джолион", "dargo", "дарго"]),
    ("Omoda", &["omoda", "омода"]),
    ("Jaecoo", &["jaecoo", "джейку", "джеку", "джаеку"]),
    ("Tenet", &["tenet", "тенет"]),
    ("Geely", &["geely", "джили", "джилли", "coolray", "кулрей", "monjaro", "монжаро"]),
    ("Changan", &["changan", "чанган", "чангань"]),
    ("Exeed", &["exeed", "эксид", "иксид"]),
    ("Tank", &["tank", "танк"]),
    ("GAC", &["gac"]),
    ("Belgee", &["belgee", "белджи"]),
    ("Zeekr", &["zeekr", "зикр"]),
    ("Voyah", &["voyah", "воях"]),
    ("Hongqi", &["hongqi", "хончи", "хунцы"]),
    ("Dongfeng", &["dongfeng", "донгфенг", "дунфэн"]),
    ("Москвич", &["москвич", "moskvich"]),
    ("Lada", &["lada", "лада", "ладу", "ладе", "лады", "ладой", "ваз", "vaz", "гранта", "веста", "нива", "niva", "vesta", "granta"]),
    ("УАЗ", &["уаз", "uaz"]),
    ("Toyota", &["toyota", "тойота", "тойот", "тоета", "camry", "камри", "rav4", "land cruiser", "ленд крузер", "крузак"]),
    ("Lexus", &["lexus", "лексус"]),
    ("Nissan", &["nissan", "ниссан", "нисан", "qashqai", "кашкай", "x-trail"]),
    ("Infiniti", &["infiniti", "инфинити"]),
    ("Mazda", &["mazda", "мазда", "мазд"]),
    ("Honda", &["honda", "хонда", "хонд"]),
    ("Mitsubishi", &["mitsubishi", "митсубиси", "мицубиси", "митсубиши", "паджеро", "pajero", "outlander", "аутлендер"]),
    ("Subaru", &["subaru", "субару"]),
    ("Suzuki", &["suzuki", "сузуки"]),
    ("Hyundai", &["hyundai", "хендай", "хундай", "хюндай", "хендэ", "solaris", "солярис", "creta", "крета", "tucson", "туссан"]),
    ("Kia", &["kia", "киа", "кия", "rio", "sportage", "спортейдж", "спортаж"]),
    ("Volkswagen", &["volkswagen", "vw", "фольксваген", "фольц", "фв", "tiguan", "тигуан", "polo", "passat", "пассат"]),
    ("Skoda", &["skoda", "шкода", "шкод", "octavia", "октавия", "kodiaq", "кодиак"]),
    ("Audi", &["audi", "ауди"]),
    ("BMW", &["bmw", "бмв", "бумер", "беха"]),
    ("Mercedes-Benz", &["mercedes", "мерседес", "мерс", "benz", "бенц", "гелик", "гелендваген"]),
    ("Porsche", &["porsche", "порше", "cayenne", "кайен", "macan", "макан"]),
    ("Volvo", &["volvo", "вольво"]),
    ("Land Rover", &["land rover", "ленд ровер", "лэнд ровер", "range rover", "рендж ровер", "ренж ровер"]),
    ("Jaguar", &["jaguar", "ягуар"]),
    ("Renault", &["renault", "рено", "duster", "дастер", "логан", "logan"]),
    ("Peugeot", &["peugeot", "пежо"]),
    ("Citroen", &["citroen", "ситроен"]),
    ("Opel", &["opel", "опель"]),
    ("Ford", &["ford", "форд", "focus"]),
    ("Chevrolet", &["chevrolet", "шевроле", "шеви"]),
    ("Cadillac", &["cadillac", "кадиллак"]),
    ("Jeep", &["jeep"]),
    ("Tesla", &["tesla", "тесла"]),
    ("Mini", &["mini cooper", "мини купер"]),
];

#[derive(Debug, Clone)]
struct BrandEntry {
    canonical: String,
    /// Each alias as its token sequence.
    aliases: Vec<Vec<String>>,
}

/// Maps free text to canonical brand names and answers dealer/ecosystem membership.
#[derive(Debug, Clone)]
pub struct BrandMatcher {
    entries: Vec<BrandEntry>,
    dealer: BTreeSet<String>,
    ecosystem: BTreeSet<String>,
}

impl BrandMatcher {
    /// Built-in gazetteer with the given dealer and ecosystem brand sets.
    pub fn new<S: AsRef<str>>(dealer: &[S], ecosystem: &[S]) -> Self {
        let entries = GAZETTEER
            .iter()
            .map(|(canonical, aliases)| BrandEntry {
                canonical: (*canonical).to_string(),
                aliases: aliases
                    .iter()
                    .map(|a| words(&normalize(a)).into_iter().map(String::from).collect())
                    .collect(),
            })
            .collect();
        Self {
            entries,
            dealer: dealer.iter().map(|b| b.as_ref().to_lowercase()).collect(),
            ecosystem: ecosystem.iter().map(|b| b.as_ref().to_lowercase()).collect(),
        }
    }

    /// First brand mentioned in `text` (by position), in canonical spelling.
    pub fn find_brand(&self, text: &str) -> Option<&str> {
        let normalized = normalize(text);
        let tokens = words(&normalized);
        for start in 0..tokens.len() {
            for entry in &self.entries {
                if entry
                    .aliases
                    .iter()
                    .any(|alias| alias_matches_at(&tokens, start, alias))
                {
                    return Some(&entry.canonical);
                }
            }
        }
        None
    }

    /// Canonical spelling of a brand name coming from elsewhere (e.g. a classifier).
    pub fn canonicalize(&self, name: &str) -> Option<&str> {
        let lower = normalize(name.trim());
        self.entries
            .iter()
            .find(|e| e.canonical.to_lowercase() == lower)
            .map(|e| e.canonical.as_str())
            .or_else(|| self.find_brand(name))
    }

    pub fn is_dealer(&self, brand: &str) -> bool {
        self.dealer.contains(&brand.trim().to_lowercase())
    }

    pub fn is_ecosystem(&self, brand: &str) -> bool {
        self.ecosystem.contains(&brand.trim().to_lowercase())
    }

    /// Dealer brands in canonical spelling.
    pub fn dealer_brands(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|e| self.is_dealer(&e.canonical))
            .map(|e| e.canonical.clone())
            .collect()
    }
}

impl Default for BrandMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DEALER_BRANDS, DEFAULT_ECOSYSTEM_BRANDS)
    }
}

fn alias_matches_at(tokens: &[&str], start: usize, alias: &[String]) -> bool {
    if alias.is_empty() || start + alias.len() > tokens.len() {
        return false;
    }
    let last = alias.len() - 1;
    alias.iter().enumerate().all(|(i, part)| {
        let token = tokens[start + i];
        token == part || (i == last && inflected(token, part))
    })
}

fn inflected(token: &str, alias: &str) -> bool {
    let alias_len = alias.chars().count();
    if alias_len < MIN_INFLECTABLE || !alias.chars().all(is_cyrillic) {
        return false;
    }
    token
        .strip_prefix(alias)
        .is_some_and(|ending| CASE_ENDINGS.contains(&ending))
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, 'а'..='я' | 'ё')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> BrandMatcher {
        BrandMatcher::default()
    }

    #[test]
    fn latin_and_cyrillic_aliases() {
        let m = matcher();
        assert_eq!(m.find_brand("хочу купить новый Porsche"), Some("Porsche"));
        assert_eq!(m.find_brand("есть ли порше кайен"), Some("Porsche"));
        assert_eq!(m.find_brand("у меня БМВ"), Some("BMW"));
        assert_eq!(m.find_brand("Чери Тигго"), Some("Chery"));
    }

    #[test]
    fn inflected_forms() {
        let m = matcher();
        assert_eq!(m.find_brand("интересует хавала цена"), Some("Haval"));
        assert_eq!(m.find_brand("ремонт мерседеса"), Some("Mercedes-Benz"));
        assert_eq!(m.find_brand("продаю тойоту"), Some("Toyota"));
    }

    #[test]
    fn model_names_resolve_to_brand() {
        let m = matcher();
        assert_eq!(m.find_brand("хочу купить ФВ Тигуан"), Some("Volkswagen"));
        assert_eq!(m.find_brand("Tiggo 7 Pro в наличии?"), Some("Chery"));
    }

    #[test]
    fn multi_word_alias() {
        assert_eq!(matcher().find_brand("нужен Land Rover Defender"), Some("Land Rover"));
    }

    #[test]
    fn earliest_mention_wins() {
        assert_eq!(matcher().find_brand("меняю kia на haval"), Some("Kia"));
    }

    #[test]
    fn ordinary_words_do_not_match() {
        let m = matcher();
        assert_eq!(m.find_brand("давайте второй вариант"), None);
        assert_eq!(m.find_brand("ладно, сколько стоит"), None);
        assert_eq!(m.find_brand("минивэн до 3 млн"), None);
        assert_eq!(m.find_brand("нужна замена масла"), None);
        assert_eq!(m.find_brand("стучит поршень"), None);
    }

    #[test]
    fn dealer_membership() {
        let m = matcher();
        assert!(m.is_dealer("Chery"));
        assert!(m.is_dealer("haval"));
        assert!(!m.is_dealer("Porsche"));
        assert!(m.is_ecosystem("Omoda"));
        assert!(!m.is_ecosystem("Haval"));
        assert_eq!(m.dealer_brands().len(), 3);
    }

    #[test]
    fn canonicalize_classifier_names() {
        let m = matcher();
        assert_eq!(m.canonicalize("bmw"), Some("BMW"));
        assert_eq!(m.canonicalize("Мерседес"), Some("Mercedes-Benz"));
        assert_eq!(m.canonicalize("Unknown Motors"), None);
    }
}
