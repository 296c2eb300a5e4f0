//! Framework control catalogues, per spec §4.K.
//!
//! Control ids follow the teacher's own convention in
//! `packages/governance/src/audit/evidence.rs` (`"CC6.1"`, `"A.9.4"`, ...).

use crate::types::FrameworkId;

#[derive(Debug, Clone)]
pub struct ControlDef {
    pub control_id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub priority: &'static str,
}

#[derive(Debug, Clone)]
pub struct FrameworkTemplate {
    pub id: FrameworkId,
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub controls: Vec<ControlDef>,
}

fn soc2_controls() -> Vec<ControlDef> {
    vec![
        ControlDef { control_id: "CC6.1", title: "Logical Access Controls", description: "Restricts logical access to authorized users.", category: "security", priority: "high" },
        ControlDef { control_id: "CC6.6", title: "Boundary Protection", description: "Protects against unauthorized boundary access.", category: "security", priority: "high" },
        ControlDef { control_id: "CC7.1", title: "System Operations Monitoring", description: "Detects and responds to anomalies in operations.", category: "operations", priority: "medium" },
        ControlDef { control_id: "CC8.1", title: "Change Management", description: "Authorizes, designs, and implements changes.", category: "change-management", priority: "medium" },
    ]
}

fn iso27001_controls() -> Vec<ControlDef> {
    vec![
        ControlDef { control_id: "A.9.4", title: "System Access Control", description: "Restricts access to information and systems.", category: "access-control", priority: "high" },
        ControlDef { control_id: "A.12.4", title: "Logging and Monitoring", description: "Records events and maintains audit logs.", category: "operations", priority: "high" },
        ControlDef { control_id: "A.16.1", title: "Incident Management", description: "Manages information security incidents.", category: "incident-response", priority: "medium" },
    ]
}

fn hipaa_controls() -> Vec<ControlDef> {
    vec![
        ControlDef { control_id: "164.312(a)", title: "Access Control", description: "Technical policies for electronic PHI access.", category: "access-control", priority: "high" },
        ControlDef { control_id: "164.312(b)", title: "Audit Controls", description: "Hardware/software mechanisms recording PHI access.", category: "operations", priority: "high" },
    ]
}

fn gdpr_controls() -> Vec<ControlDef> {
    vec![
        ControlDef { control_id: "Art.32", title: "Security of Processing", description: "Appropriate technical and organisational measures.", category: "security", priority: "high" },
        ControlDef { control_id: "Art.33", title: "Breach Notification", description: "Notifies supervisory authority of personal data breaches.", category: "incident-response", priority: "high" },
    ]
}

fn pci_dss_controls() -> Vec<ControlDef> {
    vec![
        ControlDef { control_id: "Req.10", title: "Track and Monitor Access", description: "Tracks and monitors all access to network resources and cardholder data.", category: "operations", priority: "high" },
        ControlDef { control_id: "Req.11", title: "Security Testing", description: "Regularly tests security systems and processes.", category: "security", priority: "medium" },
    ]
}

pub fn template_for(id: FrameworkId) -> Option<FrameworkTemplate> {
    match id {
        FrameworkId::Soc2Type1 => Some(FrameworkTemplate {
            id,
            name: "SOC 2 Type I",
            version: "2017",
            description: "Point-in-time assessment of control design.",
            controls: soc2_controls(),
        }),
        FrameworkId::Soc2Type2 => Some(FrameworkTemplate {
            id,
            name: "SOC 2 Type II",
            version: "2017",
            description: "Period assessment of control design and operating effectiveness.",
            controls: soc2_controls(),
        }),
        FrameworkId::Iso27001 => Some(FrameworkTemplate {
            id,
            name: "ISO/IEC 27001",
            version: "2022",
            description: "Information security management system standard.",
            controls: iso27001_controls(),
        }),
        FrameworkId::Hipaa => Some(FrameworkTemplate {
            id,
            name: "HIPAA Security Rule",
            version: "2013",
            description: "Protects electronic protected health information.",
            controls: hipaa_controls(),
        }),
        FrameworkId::Gdpr => Some(FrameworkTemplate {
            id,
            name: "GDPR",
            version: "2016/679",
            description: "EU General Data Protection Regulation.",
            controls: gdpr_controls(),
        }),
        FrameworkId::PciDss => Some(FrameworkTemplate {
            id,
            name: "PCI DSS",
            version: "4.0",
            description: "Payment Card Industry Data Security Standard.",
            controls: pci_dss_controls(),
        }),
        FrameworkId::Custom => None,
    }
}
