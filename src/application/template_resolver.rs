// Template resolver - merges a widget template with per-instance overrides
use crate::domain::catalog::{LayoutHint, WidgetKind, WidgetTemplate};
use crate::domain::widget::SectionOverride;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMeasurement {
    pub measurement_id: String,
    pub display_types: Vec<WidgetKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSection<'a> {
    /// Position of the section in the template
    pub index: usize,
    pub title: Option<&'a str>,
    pub measurements: Vec<ResolvedMeasurement>,
    pub layout_hints: &'a HashMap<String, LayoutHint>,
}

/// Decide what a composite widget renders.
///
/// Each measurement of each section is resolved against the override keyed
/// by its own id: hidden measurements are dropped, and an override's display
/// types replace the section defaults. A section left with no measurements is
/// omitted. Template order is kept unless `order` lists measurement ids, in
/// which case sections and the measurements inside them are stably sorted by
/// their position in that list; unlisted ids go last.
pub fn resolve_sections<'a>(
    template: &'a WidgetTemplate,
    overrides: &HashMap<String, SectionOverride>,
    order: Option<&[String]>,
) -> Vec<ResolvedSection<'a>> {
    let mut sections: Vec<ResolvedSection<'a>> = template
        .sections
        .iter()
        .enumerate()
        .filter_map(|(index, section)| {
            let measurements: Vec<ResolvedMeasurement> = section
                .measurement_ids
                .iter()
                .filter_map(|id| {
                    let override_ = overrides.get(id);
                    if override_.is_some_and(|o| o.hidden) {
                        return None;
                    }
                    let display_types = override_
                        .and_then(|o| o.display_types.clone())
                        .unwrap_or_else(|| section.display_types.clone());
                    Some(ResolvedMeasurement {
                        measurement_id: id.clone(),
                        display_types,
                    })
                })
                .collect();

            if measurements.is_empty() {
                return None;
            }

            Some(ResolvedSection {
                index,
                title: section.title.as_deref(),
                measurements,
                layout_hints: &section.layout_hints,
            })
        })
        .collect();

    if let Some(order) = order {
        apply_order(&mut sections, order);
    }

    sections
}

fn apply_order(sections: &mut [ResolvedSection<'_>], order: &[String]) {
    let rank = |id: &str| order.iter().position(|o| o == id).unwrap_or(usize::MAX);

    for section in sections.iter_mut() {
        section
            .measurements
            .sort_by_key(|m| rank(&m.measurement_id));
    }
    sections.sort_by_key(|s| {
        s.measurements
            .first()
            .map(|m| rank(&m.measurement_id))
            .unwrap_or(usize::MAX)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::tests::sample_catalog;
    use crate::domain::catalog::WidgetType;

    fn climate() -> WidgetTemplate {
        sample_catalog()
            .template(Some("lht65"), "climate")
            .unwrap()
            .1
            .clone()
    }

    fn ids(sections: &[ResolvedSection<'_>]) -> Vec<Vec<String>> {
        sections
            .iter()
            .map(|s| s.measurements.iter().map(|m| m.measurement_id.clone()).collect())
            .collect()
    }

    fn hidden() -> SectionOverride {
        SectionOverride {
            hidden: true,
            display_types: None,
        }
    }

    #[test]
    fn test_no_overrides_keeps_template() {
        let template = climate();
        let sections = resolve_sections(&template, &HashMap::new(), None);

        assert_eq!(sections.len(), 4);
        assert_eq!(
            sections[0].measurements[0].display_types,
            vec![
                WidgetKind::Known(WidgetType::CurrentValue),
                WidgetKind::Known(WidgetType::Gauge)
            ]
        );
        assert_eq!(sections[2].title, Some("Trends"));
        assert_eq!(sections[2].layout_hints["time_series"].span, Some(2));
    }

    #[test]
    fn test_hidden_measurement_leaves_siblings() {
        let template = climate();
        let overrides = HashMap::from([("humidity".to_string(), hidden())]);
        let sections = resolve_sections(&template, &overrides, None);

        assert_eq!(
            ids(&sections),
            vec![
                vec!["temperature".to_string()],
                vec!["temperature".to_string()],
                vec!["battery".to_string()],
            ]
        );
        assert_eq!(sections[1].index, 2);
    }

    #[test]
    fn test_display_type_override() {
        let template = climate();
        let overrides = HashMap::from([(
            "temperature".to_string(),
            SectionOverride {
                hidden: false,
                display_types: Some(vec![WidgetKind::Known(WidgetType::Status)]),
            },
        )]);
        let sections = resolve_sections(&template, &overrides, None);

        assert_eq!(
            sections[0].measurements[0].display_types,
            vec![WidgetKind::Known(WidgetType::Status)]
        );
        // combined section: each id resolved on its own
        assert_eq!(
            sections[2].measurements[0].display_types,
            vec![WidgetKind::Known(WidgetType::Status)]
        );
        assert_eq!(
            sections[2].measurements[1].display_types,
            vec![WidgetKind::Known(WidgetType::TimeSeries)]
        );
    }

    #[test]
    fn test_explicit_order_is_finishing_pass() {
        let template = climate();
        let order = vec!["battery".to_string(), "humidity".to_string()];
        let sections = resolve_sections(&template, &HashMap::new(), Some(&order));

        assert_eq!(
            ids(&sections),
            vec![
                vec!["battery".to_string()],
                vec!["humidity".to_string()],
                vec!["humidity".to_string(), "temperature".to_string()],
                vec!["temperature".to_string()],
            ]
        );
    }
}
