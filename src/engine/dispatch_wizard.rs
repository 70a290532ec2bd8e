// ==========================================
// 物资集散中心 - 出库向导
// ==========================================
// 步骤: 受益方 → 物品 → 运输 → 更正并关闭
// 向导状态只存在于内存，定稿前不写库
// 产出: DispatchDraft（交给 DispatchFinalizer）
// ==========================================

use crate::domain::dispatch::{DispatchDraft, DraftLine};
use crate::domain::kit::Kit;
use crate::domain::product::Product;
use crate::domain::types::{DispatchReason, TransportType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ==========================================
// WizardStep - 向导步骤
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    BeneficiarySelection,
    ItemSelection,
    TransportSelection,
    RectificationAndClose,
}

impl WizardStep {
    fn next(self) -> Option<WizardStep> {
        match self {
            WizardStep::BeneficiarySelection => Some(WizardStep::ItemSelection),
            WizardStep::ItemSelection => Some(WizardStep::TransportSelection),
            WizardStep::TransportSelection => Some(WizardStep::RectificationAndClose),
            WizardStep::RectificationAndClose => None,
        }
    }

    fn previous(self) -> Option<WizardStep> {
        match self {
            WizardStep::BeneficiarySelection => None,
            WizardStep::ItemSelection => Some(WizardStep::BeneficiarySelection),
            WizardStep::TransportSelection => Some(WizardStep::ItemSelection),
            WizardStep::RectificationAndClose => Some(WizardStep::TransportSelection),
        }
    }
}

// ==========================================
// WizardError - 向导校验错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WizardError {
    #[error("当前步骤为 {actual:?}，该操作需要 {expected:?}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },

    #[error("未选择受益方")]
    MissingBeneficiary,

    #[error("未选择出库原因")]
    MissingReason,

    #[error("出库原因为“其他”时必须填写说明")]
    MissingReasonDetail,

    #[error("购物车为空")]
    EmptyCart,

    #[error("套装没有模板行: {0}")]
    EmptyKit(String),

    #[error("数量无效: {0}")]
    InvalidQuantity(i64),

    #[error("产品已停用: {0}")]
    InactiveProduct(String),

    #[error("套装模板行引用的产品缺少信息: product_id={0}")]
    UnknownProduct(i64),

    #[error("超出库存: product_id={product_id}, requested={requested}, available={available}")]
    ExceedsStock {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("未选择运输方式")]
    MissingTransport,

    #[error("运输费用无效: {0}")]
    InvalidTransportCost(f64),

    #[error("购物车行不存在: {0}")]
    UnknownLine(String),
}

// ==========================================
// CartLine - 购物车行（临时 id 仅用于向导内定位）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub temp_id: String,
    pub product_id: i64,
    pub product_name: String,
    pub reference_price: f64,
    pub quantity: i64,
}

/// 套装展开时每个组成产品的当前信息（启用状态与参考库存）
#[derive(Debug, Clone, PartialEq)]
pub struct KitComponent {
    pub product: Product,
    pub available_stock: Option<i64>,
}

/// 运输选择
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportChoice {
    pub transport_type: TransportType,
    pub cost: f64,
}

/// 更正界面中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectificationRow {
    pub temp_id: String,
    pub product_name: String,
    pub system_quantity: i64,
    pub real_quantity: i64,
    /// 实发 - 申请（负数表示短缺）
    pub difference: i64,
}

// ==========================================
// DispatchWizard - 出库向导
// ==========================================
#[derive(Debug, Clone)]
pub struct DispatchWizard {
    step: WizardStep,
    beneficiary_id: Option<i64>,
    reason: Option<DispatchReason>,
    reason_detail: Option<String>,
    cart: Vec<CartLine>,
    transport: Option<TransportChoice>,
    adjustments: HashMap<String, i64>,
    cap_to_stock: bool,
}

impl DispatchWizard {
    /// 创建向导
    ///
    /// # 参数
    /// - `cap_to_stock`: 为 true 时加入购物车的数量不得超过传入的参考库存
    pub fn new(cap_to_stock: bool) -> Self {
        Self {
            step: WizardStep::BeneficiarySelection,
            beneficiary_id: None,
            reason: None,
            reason_detail: None,
            cart: Vec::new(),
            transport: None,
            adjustments: HashMap::new(),
            cap_to_stock,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.cart
    }

    pub fn transport(&self) -> Option<TransportChoice> {
        self.transport
    }

    fn ensure_step(&self, expected: WizardStep) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    // ==========================================
    // 步骤 1: 受益方与原因
    // ==========================================

    /// 选择受益方与出库原因
    pub fn select_beneficiary(
        &mut self,
        beneficiary_id: i64,
        reason: DispatchReason,
        reason_detail: Option<&str>,
    ) -> Result<(), WizardError> {
        self.ensure_step(WizardStep::BeneficiarySelection)?;

        let detail = reason_detail
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        if reason == DispatchReason::Other && detail.is_none() {
            return Err(WizardError::MissingReasonDetail);
        }

        self.beneficiary_id = Some(beneficiary_id);
        self.reason = Some(reason);
        self.reason_detail = detail;
        Ok(())
    }

    // ==========================================
    // 步骤 2: 物品
    // ==========================================

    /// 加入单个产品，返回临时行 id
    ///
    /// `available_stock` 仅供参考；开启封顶时才作为上限校验
    pub fn add_product(
        &mut self,
        product: &Product,
        quantity: i64,
        available_stock: Option<i64>,
    ) -> Result<String, WizardError> {
        self.ensure_step(WizardStep::ItemSelection)?;
        self.check_line(product, quantity, available_stock, 0)?;
        Ok(self.push_line(product.id, &product.name, product.reference_price, quantity))
    }

    /// 展开套装: 每个模板行生成一个独立购物车行
    ///
    /// `components` 提供各组成产品的当前状态；与单品相同的停用与封顶校验
    /// 逐行执行，任一行不通过则整个套装都不加入。
    pub fn add_kit(
        &mut self,
        kit: &Kit,
        components: &[KitComponent],
    ) -> Result<Vec<String>, WizardError> {
        self.ensure_step(WizardStep::ItemSelection)?;
        if kit.items.is_empty() {
            return Err(WizardError::EmptyKit(kit.name.clone()));
        }

        // 同一套装内重复出现的产品累计计入上限
        let mut pending: HashMap<i64, i64> = HashMap::new();
        for item in &kit.items {
            let component = components
                .iter()
                .find(|c| c.product.id == item.product_id)
                .ok_or(WizardError::UnknownProduct(item.product_id))?;
            let earlier = pending.get(&item.product_id).copied().unwrap_or(0);
            self.check_line(
                &component.product,
                item.quantity,
                component.available_stock,
                earlier,
            )?;
            *pending.entry(item.product_id).or_insert(0) += item.quantity;
        }

        let ids = kit
            .items
            .iter()
            .map(|item| {
                self.push_line(
                    item.product_id,
                    &item.product_name,
                    item.reference_price,
                    item.quantity,
                )
            })
            .collect();
        Ok(ids)
    }

    /// 单行校验: 数量、启用状态、（开启时）购物车累计不超过参考库存
    fn check_line(
        &self,
        product: &Product,
        quantity: i64,
        available_stock: Option<i64>,
        pending: i64,
    ) -> Result<(), WizardError> {
        if quantity <= 0 {
            return Err(WizardError::InvalidQuantity(quantity));
        }
        if !product.active {
            return Err(WizardError::InactiveProduct(product.name.clone()));
        }
        if self.cap_to_stock {
            let available = available_stock.unwrap_or(0);
            let already: i64 = self
                .cart
                .iter()
                .filter(|l| l.product_id == product.id)
                .map(|l| l.quantity)
                .sum();
            let requested = already + pending + quantity;
            if requested > available {
                return Err(WizardError::ExceedsStock {
                    product_id: product.id,
                    requested,
                    available,
                });
            }
        }
        Ok(())
    }

    fn push_line(&mut self, product_id: i64, name: &str, price: f64, quantity: i64) -> String {
        let temp_id = uuid::Uuid::new_v4().to_string();
        self.cart.push(CartLine {
            temp_id: temp_id.clone(),
            product_id,
            product_name: name.to_string(),
            reference_price: price,
            quantity,
        });
        temp_id
    }

    /// 按临时 id 移除购物车行
    pub fn remove_line(&mut self, temp_id: &str) -> Result<(), WizardError> {
        self.ensure_step(WizardStep::ItemSelection)?;
        let before = self.cart.len();
        self.cart.retain(|l| l.temp_id != temp_id);
        if self.cart.len() == before {
            return Err(WizardError::UnknownLine(temp_id.to_string()));
        }
        self.adjustments.remove(temp_id);
        Ok(())
    }

    // ==========================================
    // 步骤 3: 运输
    // ==========================================

    /// 选择运输方式；机构运输费用固定为 0
    pub fn select_transport(
        &mut self,
        transport_type: TransportType,
        cost: f64,
    ) -> Result<(), WizardError> {
        self.ensure_step(WizardStep::TransportSelection)?;
        let cost = match transport_type {
            TransportType::Institutional => 0.0,
            TransportType::External => {
                if !cost.is_finite() || cost < 0.0 {
                    return Err(WizardError::InvalidTransportCost(cost));
                }
                cost
            }
        };
        self.transport = Some(TransportChoice {
            transport_type,
            cost,
        });
        Ok(())
    }

    /// 估算总额（数量 × 参考价 + 运输费），仅展示，不持久化
    pub fn estimated_total(&self) -> f64 {
        let goods: f64 = self
            .cart
            .iter()
            .map(|l| l.quantity as f64 * l.reference_price)
            .sum();
        goods + self.transport.map_or(0.0, |t| t.cost)
    }

    // ==========================================
    // 步骤 4: 更正
    // ==========================================

    /// 录入实盘数量
    pub fn set_real_quantity(&mut self, temp_id: &str, real: i64) -> Result<(), WizardError> {
        self.ensure_step(WizardStep::RectificationAndClose)?;
        if real < 0 {
            return Err(WizardError::InvalidQuantity(real));
        }
        if !self.cart.iter().any(|l| l.temp_id == temp_id) {
            return Err(WizardError::UnknownLine(temp_id.to_string()));
        }
        self.adjustments.insert(temp_id.to_string(), real);
        Ok(())
    }

    /// 更正界面数据（实发默认等于申请）
    pub fn rectification_rows(&self) -> Vec<RectificationRow> {
        self.cart
            .iter()
            .map(|line| {
                let real = self.real_quantity_of(line);
                RectificationRow {
                    temp_id: line.temp_id.clone(),
                    product_name: line.product_name.clone(),
                    system_quantity: line.quantity,
                    real_quantity: real,
                    difference: real - line.quantity,
                }
            })
            .collect()
    }

    fn real_quantity_of(&self, line: &CartLine) -> i64 {
        self.adjustments
            .get(&line.temp_id)
            .copied()
            .unwrap_or(line.quantity)
    }

    // ==========================================
    // 步骤导航
    // ==========================================

    /// 校验当前步骤并前进
    pub fn advance(&mut self) -> Result<WizardStep, WizardError> {
        match self.step {
            WizardStep::BeneficiarySelection => {
                if self.beneficiary_id.is_none() {
                    return Err(WizardError::MissingBeneficiary);
                }
                if self.reason.is_none() {
                    return Err(WizardError::MissingReason);
                }
            }
            WizardStep::ItemSelection => {
                if self.cart.is_empty() {
                    return Err(WizardError::EmptyCart);
                }
            }
            WizardStep::TransportSelection => {
                if self.transport.is_none() {
                    return Err(WizardError::MissingTransport);
                }
            }
            WizardStep::RectificationAndClose => {
                return Err(WizardError::WrongStep {
                    expected: WizardStep::TransportSelection,
                    actual: self.step,
                })
            }
        }
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    /// 返回上一步（已录入数据保留）
    pub fn back(&mut self) -> WizardStep {
        if let Some(prev) = self.step.previous() {
            self.step = prev;
        }
        self.step
    }

    /// 生成出库草稿
    pub fn build_draft(&self, idempotency_key: Option<String>) -> Result<DispatchDraft, WizardError> {
        self.ensure_step(WizardStep::RectificationAndClose)?;
        let beneficiary_id = self.beneficiary_id.ok_or(WizardError::MissingBeneficiary)?;
        let reason = self.reason.ok_or(WizardError::MissingReason)?;
        let transport = self.transport.ok_or(WizardError::MissingTransport)?;
        if self.cart.is_empty() {
            return Err(WizardError::EmptyCart);
        }

        Ok(DispatchDraft {
            beneficiary_id,
            reason,
            reason_detail: self.reason_detail.clone(),
            transport_type: transport.transport_type,
            transport_cost: transport.cost,
            lines: self
                .cart
                .iter()
                .map(|line| DraftLine {
                    temp_id: line.temp_id.clone(),
                    product_id: line.product_id,
                    requested_quantity: line.quantity,
                    real_quantity: self.real_quantity_of(line),
                })
                .collect(),
            idempotency_key,
        })
    }
}
