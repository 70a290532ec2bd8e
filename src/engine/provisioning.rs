// ==========================================
// 物资集散中心 - 账号开通 / 登录校验
// ==========================================
// 开通: 写身份行 → 触发器生成档案 → 可选回填失效时间
// 口令: Argon2id，存 PHC 字符串（参数与盐随哈希一起保存）
// 用于批量发放临时的危机志愿者账号
// ==========================================

use crate::db;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::user::{Actor, ProvisionRequest, UserProfile, DEFAULT_TEMP_PASSWORD};
use crate::repository::{
    ActionLogRepository, NewIdentity, RepositoryError, RepositoryResult, UserRepository,
};
use rusqlite::Connection;
use serde_json::json;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// 口令最短长度
pub const MIN_PASSWORD_LEN: usize = 6;

/// 开通接口（特权操作）
pub trait UserProvisioner: Send + Sync {
    fn provision(&self, actor: &Actor, request: &ProvisionRequest) -> RepositoryResult<UserProfile>;
}

impl<P> UserProvisioner for Arc<P>
where
    P: UserProvisioner + ?Sized,
{
    fn provision(&self, actor: &Actor, request: &ProvisionRequest) -> RepositoryResult<UserProfile> {
        (**self).provision(actor, request)
    }
}

/// 计算口令哈希，返回 PHC 字符串
///
/// 盐取随机 uuid 的 16 字节
pub fn hash_password(password: &str) -> RepositoryResult<String> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| RepositoryError::InternalError(format!("生成口令盐失败: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| RepositoryError::InternalError(format!("口令哈希失败: {}", e)))?;
    Ok(hash.to_string())
}

/// 校验口令与已存 PHC 字符串是否匹配（常量时间比较由 argon2 完成）
pub fn verify_password(password: &str, stored: &str) -> RepositoryResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| RepositoryError::InternalError(format!("口令哈希格式无效: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 邮箱格式的最低要求: local@domain.tld
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

// ==========================================
// SqliteUserProvisioner
// ==========================================
pub struct SqliteUserProvisioner {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserProvisioner {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 邮箱 + 口令登录校验
    ///
    /// 失败时统一返回 "Invalid login credentials"，不区分账号是否存在
    pub fn authenticate(&self, email: &str, password: &str) -> RepositoryResult<UserProfile> {
        let conn = self.get_conn()?;
        let invalid = || RepositoryError::ValidationError("Invalid login credentials".to_string());

        let (id, stored) = UserRepository::find_credentials_with(&conn, email)?
            .ok_or_else(invalid)?;
        if !verify_password(password, &stored)? {
            return Err(invalid());
        }
        UserRepository::find_by_id_with(&conn, &id)?
            .ok_or_else(|| RepositoryError::not_found("UserProfile", &id))
    }
}

impl UserProvisioner for SqliteUserProvisioner {
    #[instrument(skip(self, actor, request), fields(actor = %actor.user_id, role = %request.role))]
    fn provision(&self, actor: &Actor, request: &ProvisionRequest) -> RepositoryResult<UserProfile> {
        let email = request.email.trim();
        if !is_valid_email(email) {
            return Err(RepositoryError::ValidationError(format!(
                "Unable to validate email address: invalid format ({})",
                email
            )));
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(RepositoryError::ValidationError("nombre 不能为空".to_string()));
        }
        let password = request
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_TEMP_PASSWORD);
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RepositoryError::ValidationError(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let conn = self.get_conn()?;
        let tx = db::begin_immediate(&conn)?;

        if UserRepository::email_exists_with(&tx, email)? {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "User already registered: {}",
                email
            )));
        }

        let user_id = uuid::Uuid::new_v4().to_string();
        let password_hash = hash_password(password)?;
        UserRepository::insert_identity_with(
            &tx,
            &NewIdentity {
                id: &user_id,
                email,
                password_hash: &password_hash,
                name,
                role: request.role,
            },
        )?;
        if request.active_until.is_some() {
            UserRepository::set_active_until_with(&tx, &user_id, request.active_until)?;
        }

        let log = ActionLog::new(ActionType::UserProvision, &actor.user_id)
            .with_entity("UserProfile", &user_id)
            .with_payload(json!({
                "email": email,
                "role": request.role.to_db_str(),
                "active_until": request.active_until.map(|t| t.to_string()),
            }));
        ActionLogRepository::insert_with(&tx, &log)?;

        let profile = UserRepository::find_by_id_with(&tx, &user_id)?
            .ok_or_else(|| RepositoryError::not_found("UserProfile", &user_id))?;
        tx.commit()?;

        info!(user_id = %profile.id, "账号已开通");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::UserRole;
    use chrono::NaiveDate;

    fn setup() -> SqliteUserProvisioner {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::initialize_schema(&conn).unwrap();
        SqliteUserProvisioner::new(Arc::new(Mutex::new(conn)))
    }

    fn admin() -> Actor {
        Actor::new("admin-1", "Admin", UserRole::Admin)
    }

    fn request(email: &str) -> ProvisionRequest {
        ProvisionRequest {
            email: email.to_string(),
            password: None,
            name: "Voluntaria".to_string(),
            role: UserRole::Volunteer,
            active_until: None,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ana@example.org"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("@example.org"));
        assert!(!is_valid_email("ana example@x.org"));
    }

    #[test]
    fn test_provision_creates_profile_via_trigger_with_default_password() {
        let provisioner = setup();
        let until = NaiveDate::from_ymd_opt(2026, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        let mut req = request("vol1@example.org");
        req.active_until = Some(until);

        let profile = provisioner.provision(&admin(), &req).unwrap();
        assert_eq!(profile.role, UserRole::Volunteer);
        assert_eq!(profile.active_until, Some(until));
        assert!(profile.active);

        let signed_in = provisioner
            .authenticate("VOL1@example.org", DEFAULT_TEMP_PASSWORD)
            .unwrap();
        assert_eq!(signed_in.id, profile.id);
        assert!(provisioner.authenticate("vol1@example.org", "otra").is_err());
    }

    #[test]
    fn test_password_stored_as_argon2_phc_string() {
        let first = hash_password("clave-segura").unwrap();
        let second = hash_password("clave-segura").unwrap();
        assert!(first.starts_with("$argon2id$"));
        // 每次随机盐
        assert_ne!(first, second);
        assert!(verify_password("clave-segura", &first).unwrap());
        assert!(!verify_password("clave-segur", &first).unwrap());
        assert!(verify_password("x", "no-es-phc").is_err());

        let provisioner = setup();
        let mut req = request("hash@example.org");
        req.password = Some("clave-segura".to_string());
        provisioner.provision(&admin(), &req).unwrap();
        let conn = provisioner.conn.lock().unwrap();
        let stored: String = conn
            .query_row(
                "SELECT password_hash FROM auth_identities WHERE email = 'hash@example.org'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("clave-segura"));
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let provisioner = setup();
        provisioner.provision(&admin(), &request("dup@example.org")).unwrap();
        let err = provisioner
            .provision(&admin(), &request("Dup@Example.org"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_short_password_rejected() {
        let provisioner = setup();
        let mut req = request("short@example.org");
        req.password = Some("abc".to_string());
        assert!(matches!(
            provisioner.provision(&admin(), &req),
            Err(RepositoryError::ValidationError(_))
        ));
    }
}
