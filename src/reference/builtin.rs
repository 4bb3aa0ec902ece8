//! Canonical reference prompts shipped with the router.

use crate::routing::types::ReferenceItem;

const CANONICAL: &[(&str, &[&str])] = &[
    (
        "Feature_Development",
        &[
            "Write new component",
            "Fix bug",
            "Commit change",
            "Push a new README file to the main branch.",
            "Create a new API endpoint and commit the implementation",
        ],
    ),
    (
        "Production_Support",
        &[
            "Investigate why the service crashed",
            "Check deployment logs for the last service incident",
            "Investigate incident logs",
            "Restart the failing service and collect logs",
        ],
    ),
    (
        "Incident_Resolution",
        &["Troubleshoot system logs", "Investigate incident logs"],
    ),
    (
        "Infrastructure_Maintenance",
        &[
            "Run maintenance scripts on the server",
            "Perform infrastructure upgrade",
            "Apply security patches to servers",
        ],
    ),
    (
        "Lead_Generation",
        &[
            "Generate a list of leads for the EMEA region",
            "Find potential customers for product X",
        ],
    ),
    (
        "Proposal_Development",
        &[
            "Prepare a proposal document for customer",
            "Assemble sales collateral and slides for the RFP",
        ],
    ),
];

/// The canonical table flattened in declaration order.
pub fn canonical_items() -> Vec<ReferenceItem> {
    CANONICAL
        .iter()
        .flat_map(|(task, phrases)| phrases.iter().map(move |p| ReferenceItem::new(*p, *task)))
        .collect()
}
