//! `data-automation-id` selectors and wait budgets for Workday tenants.

use jobfill_autofill::SelectorType;

pub const APPLY_BUTTON: &str = "[data-automation-id='jobPostingApplyButton']";
pub const APPLY_MANUALLY: &str = "[data-automation-id='applyManually']";
pub const USE_LAST_APPLICATION: &str = "[data-automation-id='useMyLastApplication']";
pub const SIGN_IN_SECTION: &str = "[data-automation-id='signInSection']";
pub const EXISTING_USER: &str = "[data-automation-id='existingUser']";
pub const CREATE_ACCOUNT_SECTION: &str = "[data-automation-id='createAccountSection']";
pub const NEW_USER: &str = "[data-automation-id='newUser']";
pub const NEXT_BUTTON: &str = "[data-automation-id='bottom-navigation-next-button']";
pub const BACK_BUTTON: &str = "[data-automation-id='bottom-navigation-previous-button']";
pub const PROGRESS_BAR: &str = "[data-automation-id='progressBar']";
pub const SELECT_INPUT: &str = "[data-automation-id='selectInputContainer'] input";
pub const MULTISELECT_INPUT: &str = "[data-automation-id='multiselectInputContainer'] input";
pub const SEARCH_BOX_INPUT: &str = "[data-automation-id='searchBox'] input";
pub const PROMPT_OPTION: &str = "[data-automation-id='promptOption']";
pub const RESUME_UPLOAD: &str = "[data-automation-id='file-upload-input-ref']";
pub const FORM_CONTROLS: &str = "input, select, textarea";

/// Apply controls tried after the oracle's own selector.
pub const APPLY_FALLBACKS: &[(&str, SelectorType)] = &[
    (APPLY_BUTTON, SelectorType::Css),
    ("[data-automation-id='applyButton']", SelectorType::Css),
    ("//button[contains(normalize-space(.), 'Apply')]", SelectorType::Xpath),
    ("//a[contains(normalize-space(.), 'Apply')]", SelectorType::Xpath),
];

/// "Start Your Application" modal: the manual path.
pub const APPLY_MANUALLY_TARGETS: &[(&str, SelectorType)] = &[
    (APPLY_MANUALLY, SelectorType::Css),
    ("//button[contains(normalize-space(.), 'Apply Manually')]", SelectorType::Xpath),
    ("//button[contains(normalize-space(.), 'Apply manually')]", SelectorType::Xpath),
];

/// Anything that shows the start-application modal is open.
pub const MODAL_MARKERS: &[(&str, SelectorType)] = &[
    (APPLY_MANUALLY, SelectorType::Css),
    (USE_LAST_APPLICATION, SelectorType::Css),
    ("//*[normalize-space(text())='Start Your Application']", SelectorType::Xpath),
];

pub const AUTH_SECTIONS: &[&str] = &[SIGN_IN_SECTION, EXISTING_USER, CREATE_ACCOUNT_SECTION, NEW_USER];

/// Save and Continue, in the order tried.
pub const SAVE_AND_CONTINUE: &[(&str, SelectorType)] = &[
    (NEXT_BUTTON, SelectorType::Css),
    ("//button[contains(normalize-space(.), 'Save and Continue')]", SelectorType::Xpath),
    ("//button[contains(normalize-space(.), 'Continue')]", SelectorType::Xpath),
    ("//button[contains(normalize-space(.), 'Next')]", SelectorType::Xpath),
];

/// Cookie banners and stray modals closed before each page.
pub const POPUP_CLOSERS: &[(&str, SelectorType)] = &[
    ("[data-automation-id='closeModal']", SelectorType::Css),
    ("[aria-label='Close']", SelectorType::Css),
    ("//button[normalize-space(.)='Accept']", SelectorType::Xpath),
    ("//button[normalize-space(.)='Accept Cookies']", SelectorType::Xpath),
    ("//button[normalize-space(.)='Close']", SelectorType::Xpath),
];

/// Wait budgets in milliseconds. Workday pages render slowly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkdayTimings {
    pub page_load_ms: u64,
    pub element_visible_ms: u64,
    pub after_click_ms: u64,
    pub after_fill_ms: u64,
    pub modal_appear_ms: u64,
    /// Pause before the engine's single retry of a failed field.
    pub retry_delay_ms: u64,
}

impl Default for WorkdayTimings {
    fn default() -> Self {
        Self {
            page_load_ms: 20_000,
            element_visible_ms: 10_000,
            after_click_ms: 3_000,
            after_fill_ms: 200,
            modal_appear_ms: 5_000,
            retry_delay_ms: 500,
        }
    }
}

impl WorkdayTimings {
    /// No waiting at all; for tests against a fake page.
    pub fn immediate() -> Self {
        Self {
            page_load_ms: 0,
            element_visible_ms: 0,
            after_click_ms: 0,
            after_fill_ms: 0,
            modal_appear_ms: 0,
            retry_delay_ms: 0,
        }
    }
}
