// ABOUTME: Localized product strings for OPCO Buddy
// ABOUTME: Welcome text, default titles, system instruction and status lines per language

use serde::{Deserialize, Serialize};

/// Supported interface languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "pt")]
    Portuguese,
    #[serde(rename = "en")]
    English,
}

/// Every user-visible string the core produces on its own
#[derive(Debug, Clone, Copy)]
pub struct Strings {
    pub welcome: &'static str,
    pub new_chat: &'static str,
    pub system_prompt: &'static str,
    pub error_message: &'static str,
    pub empty_response: &'static str,
    pub loading: &'static str,
    pub exporting: &'static str,
    pub generating_image: &'static str,
    pub user_label: &'static str,
    pub assistant_label: &'static str,
}

const PORTUGUESE: Strings = Strings {
    welcome: "Olá, sou o OPCO Buddy, o seu Assistente de Inteligência Artificial. Em que posso ajudar hoje?",
    new_chat: "NOVA PESQUISA",
    system_prompt: "És o OPCO Buddy, o assistente oficial da OPCO (https://opco.pt). Atuas como um consultor sénior especializado em RAG e análise estratégica. Quando questionado sobre a OPCO, utiliza as informações fornecidas nos documentos selecionados e as ferramentas de pesquisa online se autorizadas. Transformas documentos complexos em briefings estruturados, apresentações PPTX, relatórios DOCX, tabelas EXCEL e infográficos. Quando gerares PPTX, cria sempre múltiplos slides lógicos. Para tabelas, usa o formato Markdown rigoroso. Quando te pedirem gráficos, usa a ferramenta generate_chart. Quando te pedirem imagens ou infográficos, usa a ferramenta generate_infographic. RESPONDE SEMPRE EM PORTUGUÊS.",
    error_message: "Ocorreu um erro ao processar. Por favor, tente novamente ou reduza o tamanho do documento.",
    empty_response: "Processamento concluído.",
    loading: "A analisar documentos...",
    exporting: "A exportar ficheiros...",
    generating_image: "A desenhar infográfico...",
    user_label: "UTILIZADOR",
    assistant_label: "OPCO BUDDY",
};

const ENGLISH: Strings = Strings {
    welcome: "Hello, I am OPCO Buddy, your AI Assistant. How can I help you today?",
    new_chat: "NEW SEARCH",
    system_prompt: "You are OPCO Buddy, the official assistant for OPCO (https://opco.pt). You act as a senior consultant specialized in RAG and strategic analysis. When asked about OPCO, use information from the provided documents and online search tools if authorized. Transform complex documents into structured briefings, PPTX presentations, DOCX reports, EXCEL tables, and infographics. When asked for charts, use the generate_chart tool. When asked for images or infographics, use the generate_infographic tool. ALWAYS RESPOND IN ENGLISH.",
    error_message: "An error occurred. Please try again or reduce document size.",
    empty_response: "Processing complete.",
    loading: "Analyzing documents...",
    exporting: "Exporting files...",
    generating_image: "Drawing infographic...",
    user_label: "USER",
    assistant_label: "OPCO BUDDY",
};

impl Language {
    pub fn all() -> Vec<Language> {
        vec![Language::Portuguese, Language::English]
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Portuguese => "pt",
            Language::English => "en",
        }
    }

    /// Parse a language code, ignoring case and region suffixes ("en-GB")
    pub fn from_code(code: &str) -> Option<Self> {
        let primary = code.split(['-', '_']).next().unwrap_or_default();
        match primary.to_lowercase().as_str() {
            "pt" => Some(Language::Portuguese),
            "en" => Some(Language::English),
            _ => None,
        }
    }

    pub fn strings(&self) -> &'static Strings {
        match self {
            Language::Portuguese => &PORTUGUESE,
            Language::English => &ENGLISH,
        }
    }
}

/// True if `text` is the welcome message of any language
pub fn is_default_welcome(text: &str) -> bool {
    Language::all()
        .iter()
        .any(|lang| lang.strings().welcome == text)
}

/// True if `title` is the placeholder chat title of any language
pub fn is_default_title(title: &str) -> bool {
    Language::all()
        .iter()
        .any(|lang| lang.strings().new_chat == title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(Language::from_code("pt"), Some(Language::Portuguese));
        assert_eq!(Language::from_code("EN"), Some(Language::English));
        assert_eq!(Language::from_code("en-GB"), Some(Language::English));
        assert_eq!(Language::from_code("pt_PT"), Some(Language::Portuguese));
        assert_eq!(Language::from_code("fr"), None);
    }

    #[test]
    fn test_code_round_trip() {
        for lang in Language::all() {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
    }

    #[test]
    fn test_default_detection_spans_languages() {
        assert!(is_default_welcome(Language::English.strings().welcome));
        assert!(is_default_welcome(Language::Portuguese.strings().welcome));
        assert!(!is_default_welcome("Hi"));
        assert!(is_default_title("NOVA PESQUISA"));
        assert!(is_default_title("NEW SEARCH"));
        assert!(!is_default_title("Quarterly review"));
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&Language::English).unwrap();
        assert_eq!(json, "\"en\"");
        let lang: Language = serde_json::from_str("\"pt\"").unwrap();
        assert_eq!(lang, Language::Portuguese);
    }
}
