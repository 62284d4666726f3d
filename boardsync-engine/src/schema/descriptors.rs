//! Candidate property templates derived from the proposal source

use std::collections::BTreeSet;

use boardsync_common::models::proposal::{
    ARCHIVED_STATUS, DRAFT_STEP_TITLE, IN_PROGRESS_STATUS, REWARDS_STEP_TITLE,
};
use boardsync_common::models::{
    EvaluationSummary, FormField, FormFieldType, PropertyOption, PropertyTemplate, PropertyType,
    StepType,
};

/// Well-known ids of the project profile sub-properties
pub const PROJECT_NAME_ID: &str = "__projectName";
pub const PROJECT_EXCERPT_ID: &str = "__projectExcerpt";
pub const PROJECT_DESCRIPTION_ID: &str = "__projectDescription";
pub const PROJECT_WEBSITE_ID: &str = "__projectWebsite";
pub const PROJECT_TWITTER_ID: &str = "__projectTwitter";
pub const PROJECT_GITHUB_ID: &str = "__projectGithub";
pub const PROJECT_MEMBER_NAMES_ID: &str = "__projectMemberNames";

const PROJECT_TEXT_PROPERTIES: [(&str, &str); 6] = [
    (PROJECT_NAME_ID, "Project Name"),
    (PROJECT_EXCERPT_ID, "Project Excerpt"),
    (PROJECT_DESCRIPTION_ID, "Project Description"),
    (PROJECT_WEBSITE_ID, "Project Website"),
    (PROJECT_TWITTER_ID, "Project Twitter"),
    (PROJECT_GITHUB_ID, "Project Github"),
];

/// How a descriptor finds the template it owns on later runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKey {
    /// One per board
    System(PropertyType),
    /// One per evaluation title
    Step {
        property_type: PropertyType,
        evaluation_title: String,
    },
    /// One per criteria title
    Criteria {
        property_type: PropertyType,
        criteria_title: String,
    },
    /// One per (criteria title, reviewer)
    Reviewer {
        property_type: PropertyType,
        criteria_title: String,
        reviewer_id: String,
    },
    FormField(String),
    /// Fixed or imported id
    Id(String),
}

impl MatchKey {
    pub fn matches(&self, template: &PropertyTemplate) -> bool {
        match self {
            MatchKey::System(property_type) => template.property_type == *property_type,
            MatchKey::Step {
                property_type,
                evaluation_title,
            } => {
                template.property_type == *property_type
                    && template.evaluation_title.as_deref() == Some(evaluation_title.as_str())
            }
            MatchKey::Criteria {
                property_type,
                criteria_title,
            } => {
                template.property_type == *property_type
                    && template.criteria_title.as_deref() == Some(criteria_title.as_str())
            }
            MatchKey::Reviewer {
                property_type,
                criteria_title,
                reviewer_id,
            } => {
                template.property_type == *property_type
                    && template.criteria_title.as_deref() == Some(criteria_title.as_str())
                    && template.reviewer_id.as_deref() == Some(reviewer_id.as_str())
            }
            MatchKey::FormField(field_id) => template.form_field_id.as_deref() == Some(field_id.as_str()),
            MatchKey::Id(id) => template.id == *id,
        }
    }
}

/// A candidate template plus the key used to find its existing counterpart
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub key: MatchKey,
    pub template: PropertyTemplate,
}

impl PropertyDescriptor {
    fn new(key: MatchKey, template: PropertyTemplate) -> Self {
        Self { key, template }
    }
}

/// Everything the proposal source contributes to a board schema
#[derive(Debug, Clone, Copy)]
pub struct SchemaInputs<'a> {
    pub summaries: &'a [EvaluationSummary],
    pub form_fields: &'a [FormField],
    pub custom_properties: &'a [PropertyTemplate],
    pub reviewer_breakdown: bool,
}

fn status_color(value: &str) -> &'static str {
    match value {
        "pass" => "propColorGreen",
        "fail" => "propColorRed",
        IN_PROGRESS_STATUS => "propColorYellow",
        _ => "propColorGray",
    }
}

/// Option whose id is its value, so stored values stay readable across boards
fn value_option(value: &str, color: &str) -> PropertyOption {
    PropertyOption::new(value, value, color)
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Build every descriptor in schema order
pub fn build_descriptors(inputs: SchemaInputs<'_>) -> Vec<PropertyDescriptor> {
    let mut descriptors = system_descriptors(inputs.summaries);

    for custom in inputs.custom_properties {
        descriptors.push(imported_descriptor(custom));
    }

    descriptors.extend(step_descriptors(inputs.summaries));
    descriptors.extend(criteria_descriptors(inputs.summaries));
    if inputs.reviewer_breakdown {
        descriptors.extend(reviewer_descriptors(inputs.summaries));
    }

    let mut project_profile = false;
    for field in inputs.form_fields {
        match field.field_type {
            FormFieldType::Label => {}
            FormFieldType::ProjectProfile => project_profile = true,
            _ => descriptors.extend(form_field_descriptor(field)),
        }
    }
    if project_profile {
        descriptors.extend(project_profile_descriptors());
    }

    descriptors
}

fn system_descriptors(summaries: &[EvaluationSummary]) -> Vec<PropertyDescriptor> {
    let mut statuses = Vec::new();
    let mut step_titles = vec![DRAFT_STEP_TITLE.to_string(), REWARDS_STEP_TITLE.to_string()];

    for summary in summaries {
        push_unique(&mut statuses, &summary.status_value());
        let mut evaluations: Vec<_> = summary.evaluations.iter().collect();
        evaluations.sort_by_key(|e| e.index);
        for evaluation in evaluations {
            push_unique(&mut step_titles, &evaluation.title);
        }
    }
    push_unique(&mut statuses, ARCHIVED_STATUS);

    let mut status = PropertyTemplate::derived("Proposal Status", PropertyType::ProposalStatus);
    status.options = statuses
        .iter()
        .map(|value| value_option(value, status_color(value)))
        .collect();

    let mut step = PropertyTemplate::derived("Proposal Step", PropertyType::ProposalStep);
    step.options = step_titles
        .iter()
        .map(|title| value_option(title, "propColorGray"))
        .collect();

    let mut evaluation_type = PropertyTemplate::derived("Proposal Type", PropertyType::ProposalEvaluationType);
    evaluation_type.options = [StepType::Draft]
        .into_iter()
        .chain(StepType::EVALUATION_TYPES)
        .chain([StepType::Rewards])
        .map(|t| value_option(t.as_str(), "propColorGray"))
        .collect();

    [
        status,
        PropertyTemplate::derived("Proposal Url", PropertyType::ProposalUrl),
        PropertyTemplate::derived("Proposal Authors", PropertyType::ProposalAuthor),
        step,
        evaluation_type,
        PropertyTemplate::derived("Reviewer Notes", PropertyType::ProposalReviewerNotes),
    ]
    .into_iter()
    .map(|template| PropertyDescriptor::new(MatchKey::System(template.property_type), template))
    .collect()
}

fn imported_descriptor(custom: &PropertyTemplate) -> PropertyDescriptor {
    let mut template = custom.clone();
    template.proposal_field_id = Some(custom.id.clone());
    template.read_only_values = true;
    PropertyDescriptor::new(MatchKey::Id(custom.id.clone()), template)
}

fn step_descriptors(summaries: &[EvaluationSummary]) -> Vec<PropertyDescriptor> {
    let mut titles = Vec::new();
    for summary in summaries {
        for evaluation in summary
            .evaluations
            .iter()
            .filter(|e| e.evaluation_type == StepType::Rubric)
        {
            push_unique(&mut titles, &evaluation.title);
        }
    }

    let mut descriptors = Vec::new();
    for title in titles {
        for (property_type, suffix) in [
            (PropertyType::ProposalEvaluatedBy, "Step reviewers"),
            (PropertyType::ProposalEvaluationTotal, "Step total"),
            (PropertyType::ProposalEvaluationAverage, "Step average"),
        ] {
            let mut template = PropertyTemplate::derived(format!("{} ({})", title, suffix), property_type);
            template.evaluation_title = Some(title.clone());
            descriptors.push(PropertyDescriptor::new(
                MatchKey::Step {
                    property_type,
                    evaluation_title: title.clone(),
                },
                template,
            ));
        }
    }
    descriptors
}

fn criteria_descriptors(summaries: &[EvaluationSummary]) -> Vec<PropertyDescriptor> {
    // title -> first description seen
    let mut criteria: Vec<(String, Option<String>)> = Vec::new();
    for summary in summaries {
        for evaluation in summary
            .evaluations
            .iter()
            .filter(|e| e.evaluation_type == StepType::Rubric)
        {
            for c in &evaluation.rubric_criteria {
                if !criteria.iter().any(|(title, _)| *title == c.title) {
                    criteria.push((c.title.clone(), c.description.clone()));
                }
            }
        }
    }

    let mut descriptors = Vec::new();
    for (title, description) in criteria {
        for (property_type, suffix) in [
            (PropertyType::ProposalRubricCriteriaTotal, "Criteria total"),
            (PropertyType::ProposalRubricCriteriaAverage, "Criteria average"),
        ] {
            let mut template = PropertyTemplate::derived(format!("{} ({})", title, suffix), property_type);
            template.criteria_title = Some(title.clone());
            template.description = description.clone();
            descriptors.push(PropertyDescriptor::new(
                MatchKey::Criteria {
                    property_type,
                    criteria_title: title.clone(),
                },
                template,
            ));
        }
    }
    descriptors
}

fn reviewer_descriptors(summaries: &[EvaluationSummary]) -> Vec<PropertyDescriptor> {
    // (criteria title, reviewer id) in first-seen order, with the latest known name
    let mut seen: Vec<(String, String, Option<String>)> = Vec::new();
    let mut keys = BTreeSet::new();

    for summary in summaries {
        for evaluation in summary
            .evaluations
            .iter()
            .filter(|e| e.evaluation_type == StepType::Rubric)
        {
            for answer in &evaluation.rubric_answers {
                let Some(c) = evaluation.rubric_criteria.iter().find(|c| c.id == answer.criteria_id) else {
                    continue;
                };
                let reviewer_id = answer.reviewer_id.to_string();
                if keys.insert((c.title.clone(), reviewer_id.clone())) {
                    seen.push((c.title.clone(), reviewer_id, answer.reviewer_name.clone()));
                } else if answer.reviewer_name.is_some() {
                    if let Some(entry) = seen
                        .iter_mut()
                        .find(|(title, id, _)| *title == c.title && *id == reviewer_id)
                    {
                        entry.2 = answer.reviewer_name.clone();
                    }
                }
            }
        }
    }

    let mut descriptors = Vec::new();
    for (criteria_title, reviewer_id, reviewer_name) in seen {
        let reviewer_label = reviewer_name.unwrap_or_else(|| reviewer_id.clone());
        for (property_type, suffix) in [
            (PropertyType::ProposalRubricCriteriaReviewerScore, "Score"),
            (PropertyType::ProposalRubricCriteriaReviewerComment, "Comment"),
        ] {
            let mut template = PropertyTemplate::derived(
                format!("{} - {} - {}", criteria_title, reviewer_label, suffix),
                property_type,
            );
            template.criteria_title = Some(criteria_title.clone());
            template.reviewer_id = Some(reviewer_id.clone());
            descriptors.push(PropertyDescriptor::new(
                MatchKey::Reviewer {
                    property_type,
                    criteria_title: criteria_title.clone(),
                    reviewer_id: reviewer_id.clone(),
                },
                template,
            ));
        }
    }
    descriptors
}

fn form_field_descriptor(field: &FormField) -> Option<PropertyDescriptor> {
    let property_type = field.field_type.property_type()?;

    let mut template = PropertyTemplate::derived(field.name.clone(), property_type);
    template.dynamic_options = false;
    template.private = field.private;
    template.description = field.description.clone();
    template.form_field_id = Some(field.id.clone());
    if property_type.has_options() {
        template.options = field
            .options
            .iter()
            .map(|o| PropertyOption::new(o.id.clone(), o.name.clone(), o.color.clone()))
            .collect();
    }

    Some(PropertyDescriptor::new(MatchKey::FormField(field.id.clone()), template))
}

fn project_profile_descriptors() -> Vec<PropertyDescriptor> {
    let mut descriptors: Vec<PropertyDescriptor> = PROJECT_TEXT_PROPERTIES
        .iter()
        .map(|(id, name)| {
            let mut template = PropertyTemplate::derived(*name, PropertyType::Text);
            template.id = id.to_string();
            template.dynamic_options = false;
            PropertyDescriptor::new(MatchKey::Id(id.to_string()), template)
        })
        .collect();

    let mut members = PropertyTemplate::derived("Project Member Names", PropertyType::MultiSelect);
    members.id = PROJECT_MEMBER_NAMES_ID.to_string();
    descriptors.push(PropertyDescriptor::new(
        MatchKey::Id(PROJECT_MEMBER_NAMES_ID.to_string()),
        members,
    ));

    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardsync_common::models::{
        EvaluationResult, EvaluationStep, FormFieldOption, ProposalStatus, RubricAnswer,
        RubricCriteria,
    };
    use uuid::Uuid;

    fn summary(evaluations: Vec<EvaluationStep>) -> EvaluationSummary {
        EvaluationSummary {
            proposal_id: Uuid::new_v4(),
            status: ProposalStatus::Published,
            archived: false,
            has_published_rewards: false,
            evaluations,
        }
    }

    fn rubric(title: &str, criteria: &[&str], reviewer: Option<(Uuid, &str)>) -> EvaluationStep {
        let criteria: Vec<RubricCriteria> = criteria
            .iter()
            .map(|t| RubricCriteria {
                id: Uuid::new_v4(),
                title: t.to_string(),
                description: Some(format!("{} description", t)),
            })
            .collect();
        let rubric_answers = reviewer
            .map(|(id, name)| {
                criteria
                    .iter()
                    .map(|c| RubricAnswer {
                        criteria_id: c.id,
                        reviewer_id: id,
                        reviewer_name: Some(name.to_string()),
                        score: Some(1.0),
                        comment: None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        EvaluationStep {
            id: Uuid::new_v4(),
            index: 0,
            title: title.to_string(),
            evaluation_type: StepType::Rubric,
            result: None,
            rubric_criteria: criteria,
            rubric_answers,
        }
    }

    fn inputs<'a>(summaries: &'a [EvaluationSummary], fields: &'a [FormField]) -> SchemaInputs<'a> {
        SchemaInputs {
            summaries,
            form_fields: fields,
            custom_properties: &[],
            reviewer_breakdown: false,
        }
    }

    #[test]
    fn test_system_descriptors_present_once() {
        let descriptors = build_descriptors(inputs(&[], &[]));
        let system: Vec<_> = descriptors
            .iter()
            .filter(|d| matches!(d.key, MatchKey::System(_)))
            .collect();
        assert_eq!(system.len(), 6);

        let status = &descriptors[0].template;
        assert_eq!(status.property_type, PropertyType::ProposalStatus);
        assert!(status.read_only && status.read_only_values && status.dynamic_options);
        assert_eq!(status.options.last().unwrap().value, ARCHIVED_STATUS);
    }

    #[test]
    fn test_status_options_follow_observed_statuses() {
        let mut passed = rubric("Review", &["Impact"], None);
        passed.result = Some(EvaluationResult::Pass);
        let summaries = vec![summary(vec![rubric("Review", &["Impact"], None)]), summary(vec![passed])];

        let descriptors = build_descriptors(inputs(&summaries, &[]));
        let values: Vec<_> = descriptors[0].template.options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["in_progress", "pass", "archived"]);
        assert!(descriptors[0].template.options.iter().all(|o| o.id == o.value));
    }

    #[test]
    fn test_step_and_criteria_descriptors_deduplicate_titles() {
        let summaries = vec![
            summary(vec![rubric("Review", &["Impact", "Team"], None)]),
            summary(vec![rubric("Review", &["Impact"], None)]),
        ];
        let descriptors = build_descriptors(inputs(&summaries, &[]));

        let steps = descriptors.iter().filter(|d| matches!(d.key, MatchKey::Step { .. })).count();
        let criteria = descriptors
            .iter()
            .filter(|d| matches!(d.key, MatchKey::Criteria { .. }))
            .count();
        assert_eq!(steps, 3);
        assert_eq!(criteria, 4);
    }

    #[test]
    fn test_step_columns_only_for_rubric_steps() {
        let mut legal = rubric("Legal", &[], None);
        legal.evaluation_type = StepType::PassFail;
        let summaries = vec![summary(vec![rubric("Review", &["Impact"], None), legal])];

        let descriptors = build_descriptors(inputs(&summaries, &[]));
        let step_titles: Vec<_> = descriptors
            .iter()
            .filter_map(|d| match &d.key {
                MatchKey::Step { evaluation_title, .. } => Some(evaluation_title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(step_titles, vec!["Review", "Review", "Review"]);

        // Every step still shows up as a step option
        let step = descriptors
            .iter()
            .find(|d| d.key == MatchKey::System(PropertyType::ProposalStep))
            .unwrap();
        assert!(step.template.option_by_value("Legal").is_some());
    }

    #[test]
    fn test_reviewer_columns_only_when_enabled() {
        let reviewer = Uuid::new_v4();
        let summaries = vec![summary(vec![rubric("Review", &["Impact"], Some((reviewer, "alice")))])];

        let without = build_descriptors(inputs(&summaries, &[]));
        assert!(!without.iter().any(|d| matches!(d.key, MatchKey::Reviewer { .. })));

        let with = build_descriptors(SchemaInputs {
            reviewer_breakdown: true,
            ..inputs(&summaries, &[])
        });
        let reviewer_columns: Vec<_> = with
            .iter()
            .filter(|d| matches!(d.key, MatchKey::Reviewer { .. }))
            .collect();
        assert_eq!(reviewer_columns.len(), 2);
        assert_eq!(reviewer_columns[0].template.name, "Impact - alice - Score");
    }

    #[test]
    fn test_form_fields_mapped_and_filtered() {
        let form_id = Uuid::new_v4();
        let field = |id: &str, field_type: FormFieldType| FormField {
            id: id.to_string(),
            form_id,
            name: id.to_string(),
            field_type,
            options: vec![FormFieldOption {
                id: "opt-a".to_string(),
                name: "A".to_string(),
                color: "propColorBlue".to_string(),
            }],
            private: id == "wallet",
            description: None,
        };
        let fields = vec![
            field("wallet", FormFieldType::Wallet),
            field("choice", FormFieldType::Select),
            field("heading", FormFieldType::Label),
            field("project", FormFieldType::ProjectProfile),
        ];

        let descriptors = build_descriptors(inputs(&[], &fields));
        let form: Vec<_> = descriptors
            .iter()
            .filter(|d| matches!(d.key, MatchKey::FormField(_)))
            .collect();
        assert_eq!(form.len(), 2);
        assert_eq!(form[0].template.property_type, PropertyType::Text);
        assert!(form[0].template.private);
        assert!(form[0].template.options.is_empty());
        assert_eq!(form[1].template.options[0].id, "opt-a");
        assert_eq!(form[1].template.options[0].value, "A");

        let project: Vec<_> = descriptors
            .iter()
            .filter(|d| d.template.id.starts_with("__project"))
            .collect();
        assert_eq!(project.len(), 7);
        assert_eq!(project[6].template.property_type, PropertyType::MultiSelect);
        assert!(project[6].template.dynamic_options);
    }

    #[test]
    fn test_imported_properties_keep_their_id() {
        let mut custom = PropertyTemplate::new("Budget", PropertyType::Number);
        custom.id = "custom-budget".to_string();
        let descriptors = build_descriptors(SchemaInputs {
            custom_properties: std::slice::from_ref(&custom),
            ..inputs(&[], &[])
        });

        let imported = descriptors
            .iter()
            .find(|d| d.key == MatchKey::Id("custom-budget".to_string()))
            .unwrap();
        assert_eq!(imported.template.id, "custom-budget");
        assert_eq!(imported.template.proposal_field_id.as_deref(), Some("custom-budget"));
    }
}
