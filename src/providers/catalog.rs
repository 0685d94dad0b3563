//! Built-in provider tables
//!
//! Specs carry credential *keys*, not values. Descriptors are produced by
//! resolving those keys once at startup.

use super::{Category, ProviderDescriptor};
use crate::storage::CredentialResolver;

/// One query parameter of a provider's base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Literal { name: String, value: String },
    /// Value looked up by key (an environment variable name)
    Credential { name: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: String,
    pub category: Category,
    pub endpoint: String,
    pub params: Vec<QueryParam>,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>, category: Category, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            endpoint: endpoint.into(),
            params: Vec::new(),
        }
    }

    pub fn credential(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.params.push(QueryParam::Credential {
            name: name.into(),
            key: key.into(),
        });
        self
    }

    pub fn literal(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(QueryParam::Literal {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// `requestor_id` then `customer_id`, read from `<PREFIX>_REQUESTOR_ID`
    /// and `<PREFIX>_CUSTOMER_ID`
    pub fn standard_credentials(self, prefix: &str) -> Self {
        self.credential("requestor_id", format!("{prefix}_REQUESTOR_ID"))
            .credential("customer_id", format!("{prefix}_CUSTOMER_ID"))
    }

    /// Credential keys this provider needs
    pub fn credential_keys(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter_map(|param| match param {
                QueryParam::Credential { key, .. } => Some(key.as_str()),
                QueryParam::Literal { .. } => None,
            })
            .collect()
    }

    pub fn resolve(&self, credentials: &CredentialResolver) -> ProviderDescriptor {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for param in &self.params {
            match param {
                QueryParam::Literal { name, value } => {
                    query.append_pair(name, value);
                }
                QueryParam::Credential { name, key } => {
                    query.append_pair(name, &credentials.resolve(key));
                }
            }
        }
        let query = query.finish();

        let base_url = if query.is_empty() {
            self.endpoint.clone()
        } else if self.endpoint.contains('?') {
            format!("{}&{}", self.endpoint.trim_end_matches('&'), query)
        } else {
            format!("{}?{}", self.endpoint, query)
        };

        ProviderDescriptor::new(self.name.clone(), self.category, base_url)
    }
}

/// Ordered provider tables for every category
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    specs: Vec<ProviderSpec>,
}

impl ProviderCatalog {
    pub fn new(specs: Vec<ProviderSpec>) -> Self {
        Self { specs }
    }

    pub fn builtin() -> Self {
        use Category::{Books, Journals, Multimedia};

        let specs = vec![
            // Books
            ProviderSpec::new("cambridge", Books, "http://counter5.cambridge.org/reports/tr_b1")
                .credential("customer_id", "CAMBRIDGE_CUSTOMER_ID")
                .credential("requestor_id", "CAMBRIDGE_REQUESTOR_ID"),
            ProviderSpec::new(
                "ebookcentral",
                Books,
                "https://pqbi.prod.proquest.com/release/sushi/ebooks/r5/reports/tr_b1",
            )
            .standard_credentials("EBOOK_CENTRAL"),
            ProviderSpec::new("ebsco", Books, "https://sushi.ebscohost.com/R5/reports/tr_b1")
                .standard_credentials("EBSCO"),
            ProviderSpec::new("gale", Books, "https://sushi5.galegroup.com/sushi/reports/tr_b1")
                .standard_credentials("GALE"),
            // Journals
            ProviderSpec::new("ebsco", Journals, "https://sushi.ebscohost.com/R5/reports/tr_j1")
                .standard_credentials("EBSCO"),
            ProviderSpec::new("gale", Journals, "https://sushi5.galegroup.com/sushi/reports/tr_j1")
                .standard_credentials("GALE"),
            ProviderSpec::new("jstor", Journals, "https://www.jstor.org/sushi/reports/tr_j1")
                .standard_credentials("JSTOR"),
            ProviderSpec::new(
                "newsbank",
                Journals,
                "https://stats.newsbank.com/sushi_r5/servlet/reports/tr_j1",
            )
            .standard_credentials("NEWSBANK"),
            // Multimedia
            ProviderSpec::new(
                "alexander_street",
                Multimedia,
                "https://pqbi.prod.proquest.com/release/sushi/asp/sushi/reports/ir_m1",
            )
            .standard_credentials("ALEXANDER_STREET"),
            // Artstor reports through JSTOR and shares its credentials
            ProviderSpec::new("artstor", Multimedia, "https://www.jstor.org/sushi/reports/ir_m1")
                .standard_credentials("JSTOR"),
            ProviderSpec::new(
                "bloomsbury",
                Multimedia,
                "https://api-fivestar.highwire.org/sushi/reports/ir_m1",
            )
            .standard_credentials("BLOOMSBURY")
            .credential("api_key", "BLOOMSBURY_API_KEY")
            .credential("platform", "BLOOMSBURY_PLATFORM"),
        ];

        Self { specs }
    }

    pub fn specs(&self, category: Category) -> impl Iterator<Item = &ProviderSpec> {
        self.specs.iter().filter(move |spec| spec.category == category)
    }

    pub fn find(&self, category: Category, name: &str) -> Option<&ProviderSpec> {
        self.specs(category).find(|spec| spec.name == name)
    }

    /// Replace the spec with the same category and name in place, or append
    pub fn upsert(&mut self, spec: ProviderSpec) {
        match self
            .specs
            .iter_mut()
            .find(|existing| existing.category == spec.category && existing.name == spec.name)
        {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }

    pub fn remove(&mut self, category: Category, name: &str) -> bool {
        let before = self.specs.len();
        self.specs
            .retain(|spec| !(spec.category == category && spec.name == name));
        self.specs.len() != before
    }

    /// Resolve the providers of `category` in table order, or just the one
    /// named by `only`. Credentials of providers filtered out are never read.
    pub fn descriptors(
        &self,
        category: Category,
        only: Option<&str>,
        credentials: &CredentialResolver,
    ) -> Vec<ProviderDescriptor> {
        self.specs(category)
            .filter(|spec| only.map_or(true, |name| spec.name == name))
            .map(|spec| spec.resolve(credentials))
            .collect()
    }
}
