//! Which step of the Workday application the page is on.

use std::fmt;

use jobfill_autofill::{ElementLocator, SelectorType};

use super::selectors::{APPLY_BUTTON, AUTH_SECTIONS, FORM_CONTROLS, MODAL_MARKERS, PROGRESS_BAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkdayStep {
    JobListing,
    StartApplicationModal,
    CreateAccount,
    MyInformation,
    MyExperience,
    ApplicationQuestions,
    VoluntaryDisclosures,
    Review,
    FormPage,
    Unknown,
}

impl WorkdayStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkdayStep::JobListing => "job_listing",
            WorkdayStep::StartApplicationModal => "start_application_modal",
            WorkdayStep::CreateAccount => "create_account",
            WorkdayStep::MyInformation => "my_information",
            WorkdayStep::MyExperience => "my_experience",
            WorkdayStep::ApplicationQuestions => "application_questions",
            WorkdayStep::VoluntaryDisclosures => "voluntary_disclosures",
            WorkdayStep::Review => "review",
            WorkdayStep::FormPage => "form_page",
            WorkdayStep::Unknown => "unknown",
        }
    }

    /// Past the listing: the application itself has started.
    pub fn in_application(&self) -> bool {
        !matches!(self, WorkdayStep::JobListing | WorkdayStep::Unknown)
    }
}

impl fmt::Display for WorkdayStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased markers, checked against the page source in this order.
const CONTENT_STEPS: &[(WorkdayStep, &[&str])] = &[
    (
        WorkdayStep::MyInformation,
        &["my information", "myinformation", "legalnamesection", "contactinformationsection"],
    ),
    (
        WorkdayStep::MyExperience,
        &["my experience", "myexperience", "workexperience", "education"],
    ),
    (
        WorkdayStep::ApplicationQuestions,
        &["application questions", "additionalquestions", "customquestions"],
    ),
    (
        WorkdayStep::VoluntaryDisclosures,
        &["voluntary disclosures", "voluntarydisclosures", "eeo", "selfidentification"],
    ),
    (WorkdayStep::Review, &["review", "reviewpage", "applicationreview"]),
];

const AUTH_MARKERS: &[&str] = &[
    "create account",
    "sign in",
    "signin",
    "createaccount",
    "log in",
    "existing-user",
    "new-user",
];

/// Classify the current page from its URL, source and visible controls.
pub async fn detect_step(locator: &ElementLocator, url: &str, html: &str) -> WorkdayStep {
    let url = url.to_lowercase();
    let html = html.to_lowercase();

    if (url.contains("/job/") || url.contains("jobposting"))
        && locator.first_visible(APPLY_BUTTON, SelectorType::Css).await.is_some()
    {
        return WorkdayStep::JobListing;
    }

    if has_start_modal(locator).await {
        return WorkdayStep::StartApplicationModal;
    }

    if AUTH_MARKERS.iter().any(|m| html.contains(m)) {
        for section in AUTH_SECTIONS {
            if locator.first_visible(section, SelectorType::Css).await.is_some() {
                return WorkdayStep::CreateAccount;
            }
        }
    }

    for (step, markers) in CONTENT_STEPS {
        if markers.iter().any(|m| html.contains(m)) {
            return *step;
        }
    }

    if locator.first_visible(FORM_CONTROLS, SelectorType::Css).await.is_some() {
        return WorkdayStep::FormPage;
    }
    WorkdayStep::Unknown
}

pub async fn has_start_modal(locator: &ElementLocator) -> bool {
    for (selector, selector_type) in MODAL_MARKERS {
        if locator.first_visible(selector, *selector_type).await.is_some() {
            return true;
        }
    }
    false
}

/// Text of the progress bar, which names the current step on most tenants.
pub async fn step_indicator(locator: &ElementLocator) -> String {
    let Some(bar) = locator.first_visible(PROGRESS_BAR, SelectorType::Css).await else {
        return "unknown".to_string();
    };
    match locator.driver().text(&bar).await {
        Ok(text) if !text.trim().is_empty() => text.trim().chars().take(50).collect(),
        _ => "unknown".to_string(),
    }
}
