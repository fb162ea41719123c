//! Cache key namespaces. Prefixes are disjoint so that pattern-based
//! clears on one namespace cannot touch another.

pub fn drug(drug_id: &str) -> String {
    format!("drug:{drug_id}")
}

pub fn drug_predictions(drug_id: &str) -> String {
    format!("drug:{drug_id}:predictions")
}

pub fn cancer(cancer_id: &str) -> String {
    format!("cancer:{cancer_id}")
}

pub fn search_results(fingerprint: &str) -> String {
    format!("search:{fingerprint}")
}

pub fn paper_summary(pmid: &str) -> String {
    format!("paper:{pmid}:summary")
}

pub fn market_analysis(drug_id: &str, cancer_id: &str) -> String {
    format!("analysis:market:{drug_id}:{cancer_id}")
}

pub fn refresh_token(jti: &str) -> String {
    format!("refresh:{jti}")
}

pub fn rate_limit(tier: &str, identity: &str) -> String {
    format!("ratelimit:{tier}:{identity}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_do_not_collide() {
        let keys = [
            drug("metformin"),
            drug_predictions("metformin"),
            cancer("breast"),
            search_results("abc"),
            paper_summary("123"),
            market_analysis("metformin", "breast"),
            refresh_token("abc"),
            rate_limit("basic", "10.0.0.1"),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert_eq!(refresh_token("j1"), "refresh:j1");
        assert_eq!(rate_limit("basic", "u1"), "ratelimit:basic:u1");
    }
}
