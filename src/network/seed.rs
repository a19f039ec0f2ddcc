//! Initial accounts for a fresh deployment
//!
//! Creates an administrator, a pastor under it and a cell leader under the
//! pastor. Members that already exist (by email) are left untouched, so
//! running the seed twice is harmless.

use chrono::NaiveDate;
use tracing::info;

use crate::auth::{hash_password, Role};
use crate::db::{Gender, MemberDoc, Milestones};
use crate::network::store::MemberStore;
use crate::types::Result;

/// One account to seed
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub gender: Gender,
    pub birth_date: Option<NaiveDate>,
    pub milestones: Milestones,
    pub activity_level: u8,
}

impl SeedAccount {
    fn into_doc(self, supervisor_id: Option<String>) -> Result<MemberDoc> {
        let mut member = MemberDoc::new(
            self.name,
            self.email.to_lowercase(),
            hash_password(&self.password)?,
            self.role,
        );
        member.supervisor_id = supervisor_id;
        member.gender = Some(self.gender);
        member.birth_date = self.birth_date;
        member.milestones = self.milestones;
        member.activity_level = self.activity_level;
        Ok(member)
    }
}

/// Accounts seeded by default: admin, pastor and leader, in chain order
pub fn default_accounts(admin_email: &str, admin_password: &str) -> Vec<SeedAccount> {
    let all = Milestones {
        baptized: true,
        life_university: true,
        destiny_training_1: true,
        destiny_training_2: true,
        destiny_training_3: true,
    };

    vec![
        SeedAccount {
            name: "System Administrator".into(),
            email: admin_email.into(),
            password: admin_password.into(),
            role: Role::Admin,
            gender: Gender::Male,
            birth_date: NaiveDate::from_ymd_opt(1980, 1, 1),
            milestones: all.clone(),
            activity_level: 5,
        },
        SeedAccount {
            name: "Pastor Joao Silva".into(),
            email: "pastor@alianca.com".into(),
            password: "pastor123".into(),
            role: Role::Pastor,
            gender: Gender::Male,
            birth_date: NaiveDate::from_ymd_opt(1975, 5, 15),
            milestones: Milestones {
                destiny_training_3: false,
                ..all.clone()
            },
            activity_level: 5,
        },
        SeedAccount {
            name: "Leader Maria Santos".into(),
            email: "lider@alianca.com".into(),
            password: "lider123".into(),
            role: Role::Leader,
            gender: Gender::Female,
            birth_date: NaiveDate::from_ymd_opt(1990, 8, 20),
            milestones: Milestones {
                destiny_training_2: false,
                destiny_training_3: false,
                ..all
            },
            activity_level: 4,
        },
    ]
}

/// Insert each account supervised by the previous one
///
/// Returns the member for every account, whether created now or found.
pub async fn seed_chain(store: &dyn MemberStore, accounts: Vec<SeedAccount>) -> Result<Vec<MemberDoc>> {
    let mut seeded: Vec<MemberDoc> = Vec::with_capacity(accounts.len());

    for account in accounts {
        let member = match store.find_member_by_email(&account.email).await? {
            Some(existing) => {
                info!("{} already exists ({})", existing.email, existing.role);
                existing
            }
            None => {
                let supervisor_id = seeded.last().map(|m| m.id.clone());
                let created = store.insert_member(account.into_doc(supervisor_id)?).await?;
                info!("Created {} as {}", created.email, created.role);
                created
            }
        };
        seeded.push(member);
    }

    Ok(seeded)
}
