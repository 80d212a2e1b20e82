use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate, Utc};
use cloudscope_core::cost::CostRequest;
use cloudscope_core::domain::cost::{first_of_month, CostService, DateRange};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Slices of account data a query can ask about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Cost,
    Compute,
    Storage,
    Database,
    LoadBalancer,
}

impl Domain {
    pub const INVENTORY: [Domain; 4] =
        [Domain::Compute, Domain::Storage, Domain::Database, Domain::LoadBalancer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Compute => "compute",
            Self::Storage => "storage",
            Self::Database => "database",
            Self::LoadBalancer => "load_balancer",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub domains: BTreeSet<Domain>,
    /// Only set when [`Domain::Cost`] is selected.
    pub cost_service: Option<CostService>,
    pub range: Option<DateRange>,
}

impl Classification {
    pub fn includes(&self, domain: Domain) -> bool {
        self.domains.contains(&domain)
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn selects_all_inventory(&self) -> bool {
        Domain::INVENTORY.iter().all(|domain| self.includes(*domain))
    }

    pub fn cost_request(&self) -> Option<CostRequest> {
        if !self.includes(Domain::Cost) {
            return None;
        }
        let request = CostRequest { service: self.cost_service, range: None };
        Some(match self.range {
            Some(range) => request.with_range(range),
            None => request,
        })
    }

    /// Comma-joined domain names in a stable order.
    pub fn domain_names(&self) -> String {
        self.domains.iter().map(Domain::as_str).collect::<Vec<_>>().join(",")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    /// Must equal a whole token.
    Word(&'static str),
    /// May appear anywhere in the normalized text.
    Stem(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Select(Domain),
    /// Selects the domain only when no cost trigger matched.
    Browse(Domain),
    FilterCost(CostService),
}

#[derive(Clone, Copy, Debug)]
struct Rule {
    trigger: Trigger,
    action: Action,
}

const fn select(trigger: Trigger, domain: Domain) -> Rule {
    Rule { trigger, action: Action::Select(domain) }
}

const fn browse(trigger: Trigger, domain: Domain) -> Rule {
    Rule { trigger, action: Action::Browse(domain) }
}

const fn filter(trigger: Trigger, service: CostService) -> Rule {
    Rule { trigger, action: Action::FilterCost(service) }
}

use Trigger::{Stem, Word};

/// Evaluated in full against every query. Cost filters are listed in
/// priority order; the first matching filter wins. Category nouns such as
/// "compute" and "storage" only browse inventory, so "compute cost" stays a
/// cost question while "compute and storage resources" lists both.
const RULES: &[Rule] = &[
    select(Stem("cost"), Domain::Cost),
    select(Stem("custo"), Domain::Cost),
    select(Stem("gast"), Domain::Cost),
    select(Stem("billing"), Domain::Cost),
    select(Word("bill"), Domain::Cost),
    select(Stem("fatura"), Domain::Cost),
    select(Word("spend"), Domain::Cost),
    select(Word("spends"), Domain::Cost),
    select(Word("spending"), Domain::Cost),
    select(Word("spent"), Domain::Cost),
    filter(Word("rds"), CostService::Database),
    filter(Word("db"), CostService::Database),
    filter(Stem("database"), CostService::Database),
    filter(Stem("banco"), CostService::Database),
    filter(Word("ec2"), CostService::Compute),
    filter(Stem("compute"), CostService::Compute),
    filter(Stem("computação"), CostService::Compute),
    filter(Stem("computacao"), CostService::Compute),
    filter(Stem("instanc"), CostService::Compute),
    filter(Stem("instânc"), CostService::Compute),
    filter(Word("s3"), CostService::Storage),
    filter(Stem("storage"), CostService::Storage),
    filter(Stem("armazenamento"), CostService::Storage),
    filter(Stem("bucket"), CostService::Storage),
    select(Word("ec2"), Domain::Compute),
    select(Stem("instanc"), Domain::Compute),
    select(Stem("instânc"), Domain::Compute),
    select(Word("vm"), Domain::Compute),
    select(Word("vms"), Domain::Compute),
    select(Stem("virtual machine"), Domain::Compute),
    select(Stem("máquina virtual"), Domain::Compute),
    select(Stem("maquina virtual"), Domain::Compute),
    select(Stem("servidor"), Domain::Compute),
    browse(Stem("compute"), Domain::Compute),
    browse(Stem("computação"), Domain::Compute),
    browse(Stem("computacao"), Domain::Compute),
    select(Word("s3"), Domain::Storage),
    select(Stem("bucket"), Domain::Storage),
    browse(Stem("storage"), Domain::Storage),
    browse(Stem("armazenamento"), Domain::Storage),
    select(Word("rds"), Domain::Database),
    select(Word("db"), Domain::Database),
    select(Stem("database"), Domain::Database),
    select(Stem("banco"), Domain::Database),
    select(Stem("base de dados"), Domain::Database),
    select(Stem("load balanc"), Domain::LoadBalancer),
    select(Stem("load-balanc"), Domain::LoadBalancer),
    select(Stem("loadbalanc"), Domain::LoadBalancer),
    select(Stem("balanceador"), Domain::LoadBalancer),
    select(Word("elb"), Domain::LoadBalancer),
    select(Word("alb"), Domain::LoadBalancer),
    select(Word("nlb"), Domain::LoadBalancer),
];

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("janeiro", 1),
    ("fevereiro", 2),
    ("março", 3),
    ("marco", 3),
    ("abril", 4),
    ("maio", 5),
    ("junho", 6),
    ("julho", 7),
    ("agosto", 8),
    ("setembro", 9),
    ("outubro", 10),
    ("novembro", 11),
    ("dezembro", 12),
];

struct NormalizedQuery {
    text: String,
    tokens: Vec<String>,
}

impl NormalizedQuery {
    fn new(raw: &str) -> Self {
        let text = normalize_text(raw);
        let tokens = tokenize(&text);
        Self { text, tokens }
    }

    fn matches(&self, trigger: Trigger) -> bool {
        match trigger {
            Word(word) => self.tokens.iter().any(|token| token == word),
            Stem(stem) => self.text.contains(stem),
        }
    }
}

/// Keyword router from free text to the domains worth fetching.
#[derive(Clone, Debug, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> Classification {
        self.classify_at(text, Utc::now().date_naive())
    }

    /// Month names resolve against the year of `today`.
    pub fn classify_at(&self, text: &str, today: NaiveDate) -> Classification {
        let query = NormalizedQuery::new(text);

        let mut domains = BTreeSet::new();
        let mut browsed = Vec::new();
        let mut cost_filter = None;
        for rule in RULES.iter().filter(|rule| query.matches(rule.trigger)) {
            match rule.action {
                Action::Select(domain) => {
                    domains.insert(domain);
                }
                Action::Browse(domain) => browsed.push(domain),
                Action::FilterCost(service) => {
                    cost_filter.get_or_insert(service);
                }
            }
        }
        if !domains.contains(&Domain::Cost) {
            domains.extend(browsed);
        }

        let cost_service = if domains.contains(&Domain::Cost) { cost_filter } else { None };
        let range = named_month(&query.tokens, today.year());

        let classification = Classification { domains, cost_service, range };
        info!(
            event_name = "classifier.classified",
            domains = %classification.domain_names(),
            cost_service = classification.cost_service.map(|service| service.as_str()),
            range = ?classification.range,
            "query classified"
        );
        classification
    }
}

fn named_month(tokens: &[String], year: i32) -> Option<DateRange> {
    let month = tokens.iter().find_map(|token| {
        MONTHS.iter().find(|(name, _)| *name == token.as_str()).map(|(_, month)| *month)
    })?;
    first_of_month(year, month).and_then(DateRange::month_of)
}

fn normalize_text(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cloudscope_core::domain::cost::{CostService, DateRange};

    use super::{Domain, QueryClassifier};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).expect("date")
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("date")
    }

    #[test]
    fn compute_cost_selects_only_cost_with_compute_filter() {
        let classification =
            QueryClassifier::new().classify_at("What is our compute cost?", today());

        assert_eq!(classification.domains.iter().copied().collect::<Vec<_>>(), [Domain::Cost]);
        assert_eq!(classification.cost_service, Some(CostService::Compute));
        assert!(classification.range.is_none());
    }

    #[test]
    fn compute_and_storage_triggers_select_both_domains() {
        let classification =
            QueryClassifier::new().classify_at("List my EC2 instances and S3 buckets", today());

        assert!(classification.includes(Domain::Compute));
        assert!(classification.includes(Domain::Storage));
        assert!(!classification.includes(Domain::Cost));
        assert!(classification.cost_service.is_none());
    }

    #[test]
    fn category_nouns_list_inventory_unless_the_question_is_about_cost() {
        let classifier = QueryClassifier::new();

        let classification = classifier.classify_at("list compute and storage resources", today());
        assert!(classification.includes(Domain::Compute));
        assert!(classification.includes(Domain::Storage));
        assert!(!classification.includes(Domain::Cost));

        let classification = classifier.classify_at("storage cost last month", today());
        assert_eq!(classification.domains.iter().copied().collect::<Vec<_>>(), [Domain::Cost]);
        assert_eq!(classification.cost_service, Some(CostService::Storage));
    }

    #[test]
    fn spend_words_do_not_fire_inside_other_words() {
        let classifier = QueryClassifier::new();

        let classification =
            classifier.classify_at("which buckets have versioning suspended?", today());
        assert!(classification.includes(Domain::Storage));
        assert!(!classification.includes(Domain::Cost));
        assert!(classification.cost_request().is_none());

        for text in ["what did we spend?", "total spent in march", "ec2 spending"] {
            let classification = classifier.classify_at(text, today());
            assert!(classification.includes(Domain::Cost), "`{text}` should select cost");
        }
    }

    #[test]
    fn database_filter_outranks_generic_cost_and_other_services() {
        let classifier = QueryClassifier::new();

        let classification =
            classifier.classify_at("show total costs and the RDS database cost", today());
        assert_eq!(classification.cost_service, Some(CostService::Database));

        let classification = classifier.classify_at("ec2 vs rds spend", today());
        assert_eq!(classification.cost_service, Some(CostService::Database));

        let classification = classifier.classify_at("s3 and ec2 billing", today());
        assert_eq!(classification.cost_service, Some(CostService::Compute));
    }

    #[test]
    fn generic_cost_defaults_to_all_services() {
        let classification = QueryClassifier::new().classify_at("How much did we spend?", today());

        assert!(classification.includes(Domain::Cost));
        let request = classification.cost_request().expect("cost request");
        assert!(request.service.is_none());
        assert!(request.range.is_none());
    }

    #[test]
    fn portuguese_synonyms_select_each_domain() {
        let classifier = QueryClassifier::new();
        let cases = [
            ("quanto gastamos este mês?", Domain::Cost),
            ("qual o custo total", Domain::Cost),
            ("quais instâncias estão rodando", Domain::Compute),
            ("meus buckets de armazenamento", Domain::Storage),
            ("status do banco de dados", Domain::Database),
            ("liste os balanceadores de carga", Domain::LoadBalancer),
        ];

        for (text, expected) in cases {
            let classification = classifier.classify_at(text, today());
            assert!(classification.includes(expected), "`{text}` should select {expected}");
        }
    }

    #[test]
    fn acronyms_match_whole_tokens_only() {
        let classifier = QueryClassifier::new();

        let classification = classifier.classify_at("which ALB fronts the api?", today());
        assert!(classification.includes(Domain::LoadBalancer));

        let classification = classifier.classify_at("play some albums", today());
        assert!(classification.is_empty());

        let classification = classifier.classify_at("elb/nlb health", today());
        assert!(classification.includes(Domain::LoadBalancer));
    }

    #[test]
    fn first_named_month_sets_range_in_current_year() {
        let classifier = QueryClassifier::new();

        let classification = classifier.classify_at("custos de janeiro", today());
        assert_eq!(classification.range, Some(DateRange::new(date(2025, 1, 1), date(2025, 2, 1))));

        let classification = classifier.classify_at("compare March and April costs", today());
        assert_eq!(classification.range, Some(DateRange::new(date(2025, 3, 1), date(2025, 4, 1))));

        let classification = classifier.classify_at("december spend", today());
        assert_eq!(
            classification.range,
            Some(DateRange::new(date(2025, 12, 1), date(2026, 1, 1)))
        );
    }

    #[test]
    fn cost_request_carries_filter_and_range() {
        let classification =
            QueryClassifier::new().classify_at("custo do RDS em fevereiro", today());

        let request = classification.cost_request().expect("cost request");
        assert_eq!(request.service, Some(CostService::Database));
        assert_eq!(request.range, Some(DateRange::new(date(2025, 2, 1), date(2025, 3, 1))));
    }

    #[test]
    fn unrelated_text_selects_nothing() {
        let classification = QueryClassifier::new().classify_at("hello there", today());

        assert!(classification.is_empty());
        assert!(classification.cost_request().is_none());
        assert_eq!(classification.domain_names(), "");
    }

    #[test]
    fn every_inventory_domain_is_detected_together() {
        let classification = QueryClassifier::new().classify_at(
            "full inventory: instances, buckets, databases and load balancers",
            today(),
        );

        assert!(classification.selects_all_inventory());
        assert_eq!(classification.domain_names(), "compute,storage,database,load_balancer");
    }
}
